//! Listening socket and its event loop.
//!
//! [`ServerAcceptor::bind`] opens the socket; [`ServerAcceptor::spawn`] runs
//! the loop on a dedicated thread and hands back a [`ListenerHandle`] that
//! stops it. Each accepted connection is served by a
//! [`ServerConnection`](crate::ServerConnection) registered with the same
//! multiplexer.

use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

use mio::net::TcpListener;
use mio::{Interest, Token};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::ServerConnection;
use crate::error::{ServerError, ServerResult};
use crate::reactor::{Multiplexer, Ready};
use crate::shutdown::ShutdownToken;
use crate::sink::InboundSink;

/// Name of the listener thread.
pub const LISTENER_THREAD_NAME: &str = "oink-listener";

/// A bound listening socket plus the multiplexer serving it.
pub struct ServerAcceptor {
    config: ServerConfig,
    local_addr: SocketAddr,
    listener: Token,
    mux: Multiplexer<ServerConnection>,
    shutdown: ShutdownToken,
    sink: InboundSink,
}

impl ServerAcceptor {
    /// Binds the listening socket and prepares the loop.
    pub fn bind(config: &ServerConfig, sink: InboundSink) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .map_err(|e| ServerError::bind(config.bind_addr, e))?;
        let local_addr = listener.local_addr()?;

        let mut mux = Multiplexer::new()?;
        let shutdown = ShutdownToken::new(mux.waker()?);
        let token = mux.add_listener(listener)?;

        info!(addr = %local_addr, "listening");
        Ok(Self {
            config: config.clone(),
            local_addr,
            listener: token,
            mux,
            shutdown,
            sink,
        })
    }

    /// Address actually bound; differs from the configured one for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token that stops [`run`](Self::run) from another thread.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Serves connections until the shutdown token is cancelled.
    pub fn run(mut self) -> ServerResult<()> {
        while !self.shutdown.is_cancelled() {
            for ready in self.mux.wait(None)? {
                match ready {
                    Ready::Wake => {}
                    Ready::Listener(token) => self.accept_pending(token),
                    Ready::Connection(token, readiness) => self.mux.dispatch(token, readiness),
                }
            }
        }
        info!(
            addr = %self.local_addr,
            open = self.mux.connection_count(),
            "listener stopped"
        );
        Ok(())
    }

    /// Runs the loop on its own thread.
    pub fn spawn(self) -> ServerResult<ListenerHandle> {
        let local_addr = self.local_addr;
        let shutdown = self.shutdown.clone();
        let thread = thread::Builder::new()
            .name(LISTENER_THREAD_NAME.to_string())
            .spawn(move || self.run())?;
        Ok(ListenerHandle {
            local_addr,
            shutdown,
            thread: Some(thread),
        })
    }

    // Accepts until the socket would block; readiness is edge-triggered.
    fn accept_pending(&mut self, token: Token) {
        loop {
            let accepted = match self.mux.listener(token) {
                Some(listener) => listener.accept(),
                None => return,
            };
            match accepted {
                Ok((stream, peer)) => {
                    if self.mux.connection_count() >= self.config.max_connections {
                        warn!(%peer, max = self.config.max_connections, "connection limit reached, dropping");
                        continue;
                    }
                    debug!(%peer, "accepted");
                    let session = ServerConnection::new(peer, self.sink.clone());
                    if let Err(e) = self.mux.register(stream, peer, Interest::READABLE, session) {
                        warn!(%peer, error = %e, "failed to register connection");
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return;
                }
            }
        }
    }
}

/// Running listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: ShutdownToken,
    thread: Option<JoinHandle<ServerResult<()>>>,
}

impl ListenerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the loop thread is still alive.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the loop and waits for the thread. Idempotent.
    pub fn stop(&mut self) -> ServerResult<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.shutdown.cancel()?;
        match thread.join() {
            Ok(result) => result,
            Err(_) => Err(io::Error::other("listener thread panicked").into()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "listener did not stop cleanly");
        }
    }
}
