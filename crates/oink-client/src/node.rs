//! A peer: one listener, outbound sends, discovery.
//!
//! [`Node`] is the surface an application drives. It owns the listener
//! thread and the inbox it fills, and sends through a [`Dispatch`]
//! implementation, normally a [`DispatchPool`].

use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::time::Duration;

use tracing::{debug, info, warn};

use oink_core::{Address, DiscoveryMarkers, Payload, PayloadKind};
use oink_protocol::Request;
use oink_server::{InboundSink, Inbox, ListenerHandle, ServerAcceptor, ServerConfig, inbound_channel};

use crate::config::ClientConfig;
use crate::dispatcher::Outgoing;
use crate::error::ClientResult;
use crate::pool::{Dispatch, DispatchPool};

/// A received payload and what it turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub kind: PayloadKind,
    pub payload: Payload,
}

/// One oink peer.
pub struct Node<D = DispatchPool> {
    address: Address,
    nickname: String,
    markers: DiscoveryMarkers,
    max_connections: usize,
    dispatch: D,
    sink: InboundSink,
    inbox: Inbox,
    listener: Option<ListenerHandle>,
}

impl Node<DispatchPool> {
    /// Builds a node and its dispatch pool from configuration.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let pool = DispatchPool::new(
            config.dispatch.max_concurrent_sends,
            config.dispatch.poll_interval(),
        )?;
        Ok(Node::new(
            config.address(),
            config.nickname(),
            config.discovery.markers(),
            pool,
        )
        .with_max_connections(config.node.max_connections))
    }

    /// Stops listening and gives queued sends up to `timeout` to finish.
    pub fn shutdown(mut self, timeout: Duration) {
        self.stop_listening();
        self.dispatch.shutdown(timeout);
    }
}

impl<D: Dispatch> Node<D> {
    /// Creates a node that is not listening yet.
    pub fn new(
        address: Address,
        nickname: impl Into<String>,
        markers: DiscoveryMarkers,
        dispatch: D,
    ) -> Self {
        let (sink, inbox) = inbound_channel();
        Self {
            address,
            nickname: nickname.into(),
            markers,
            max_connections: ServerConfig::default().max_connections,
            dispatch,
            sink,
            inbox,
            listener: None,
        }
    }

    /// Builder: cap inbound connections.
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Address this node listens on and advertises.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Nickname sent with discovery payloads.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Discovery markers in use.
    pub fn markers(&self) -> &DiscoveryMarkers {
        &self.markers
    }

    /// The sender used for outbound requests.
    pub fn dispatcher(&self) -> &D {
        &self.dispatch
    }

    /// Whether the listener thread is running.
    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(ListenerHandle::is_running)
    }

    /// Socket address the listener is bound to.
    pub fn listening_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(ListenerHandle::local_addr)
    }

    /// Starts the listener thread. Failures are logged; see
    /// [`is_listening`](Self::is_listening).
    pub fn start_listening(&mut self) {
        if self.listener.is_some() {
            debug!(address = %self.address, "already listening");
            return;
        }
        match self.spawn_listener() {
            Ok(handle) => {
                // Port 0 binds an ephemeral port; advertise the real one.
                if self.address.port() == 0 {
                    self.address = self.address.with_port(handle.local_addr().port());
                }
                info!(address = %self.address, "listening");
                self.listener = Some(handle);
            }
            Err(e) => warn!(address = %self.address, error = %e, "failed to start listener"),
        }
    }

    fn spawn_listener(&self) -> ClientResult<ListenerHandle> {
        let config = ServerConfig::for_address(&self.address)?
            .with_max_connections(self.max_connections);
        Ok(ServerAcceptor::bind(&config, self.sink.clone())?.spawn()?)
    }

    /// Stops the listener and waits for its thread.
    pub fn stop_listening(&mut self) {
        if let Some(mut handle) = self.listener.take() {
            match handle.stop() {
                Ok(()) => info!(address = %self.address, "stopped listening"),
                Err(e) => warn!(error = %e, "listener stopped with an error"),
            }
        }
    }

    /// Moves the node to a new address, restarting the listener if it was
    /// running.
    pub fn set_address(&mut self, address: Address) {
        let was_listening = self.listener.is_some();
        self.stop_listening();
        self.address = address;
        if was_listening {
            self.start_listening();
        }
    }

    /// Sends a text message.
    pub fn send_message(&self, to: &Address, text: impl Into<String>) {
        let payload = Payload::new(to.clone(), self.address.clone(), text);
        self.send_payload(to, payload);
    }

    /// Sends a prepared payload.
    pub fn send_payload(&self, to: &Address, payload: Payload) {
        self.dispatch
            .dispatch(to.clone(), Request::message(payload).into());
    }

    /// Asks a peer's answer table about `query`; the answer is logged.
    pub fn search(&self, to: &Address, query: impl Into<String>) {
        self.dispatch
            .dispatch(to.clone(), Request::search(query).into());
    }

    /// Sends opaque bytes; the peer's echo is logged.
    pub fn send_binary(&self, to: &Address, bytes: impl Into<Vec<u8>>) {
        self.dispatch.dispatch(to.clone(), Outgoing::binary(bytes));
    }

    /// Sends a scan to every host of this node's `/24` in `hosts`, on this
    /// node's port. Returns how many sends were queued.
    pub fn scan(&self, hosts: RangeInclusive<u8>) -> usize {
        let mut sent = 0;
        for host in hosts {
            let to = match self.address.sibling(host) {
                Ok(to) => to,
                Err(e) => {
                    warn!(address = %self.address, error = %e, "cannot scan");
                    return sent;
                }
            };
            let payload = self.discovery_payload(&to, &self.markers.scan);
            self.send_payload(&to, payload);
            sent += 1;
        }
        debug!(sent, "scan queued");
        sent
    }

    /// Answers a scan.
    pub fn reply(&self, to: &Address) {
        let payload = self.discovery_payload(to, &self.markers.reply);
        self.send_payload(to, payload);
    }

    fn discovery_payload(&self, to: &Address, marker: &str) -> Payload {
        Payload::new(to.clone(), self.address.clone(), marker).with_nickname(&self.nickname)
    }

    /// Takes everything received since the last call, answering scans.
    ///
    /// Replies are never answered, so two nodes cannot loop.
    pub fn poll_inbound(&self) -> Vec<Inbound> {
        self.inbox
            .drain()
            .into_iter()
            .map(|payload| {
                let kind = self.markers.classify(&payload);
                if kind == PayloadKind::Scan {
                    debug!(from = %payload.from, "answering scan");
                    self.reply(&payload.from);
                }
                Inbound { kind, payload }
            })
            .collect()
    }
}
