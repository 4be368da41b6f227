//! One-shot outbound send driven by a private multiplexer.

use std::time::Duration;

use mio::net::TcpStream;
use tracing::{debug, warn};

use oink_core::Address;
use oink_protocol::{CLIENT_BINARY_CONTENT_TYPE, Frame, ProtocolResult, Request};
use oink_server::{Multiplexer, Ready};

use crate::connection::{CONNECTING_INTEREST, ClientConnection};
use crate::error::ClientResult;

/// Default bound on each readiness wait of a send.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What a send puts on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// A `text/json` request.
    Request(Request),
    /// Opaque bytes under a custom content type.
    Binary {
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl Outgoing {
    /// Opaque bytes tagged with the default client binary type.
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Binary {
            content_type: CLIENT_BINARY_CONTENT_TYPE.to_string(),
            bytes: bytes.into(),
        }
    }

    /// Builds the request frame.
    pub fn to_frame(&self) -> ProtocolResult<Frame> {
        match self {
            Self::Request(request) => request.to_frame(),
            Self::Binary {
                content_type,
                bytes,
            } => Ok(Frame::binary(content_type.clone(), bytes.clone())),
        }
    }
}

impl From<Request> for Outgoing {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

/// Sends one request per call over a fresh connection.
#[derive(Debug, Clone)]
pub struct ClientDispatcher {
    poll_interval: Duration,
}

impl Default for ClientDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ClientDispatcher {
    /// Creates a dispatcher whose loop wakes at least every `poll_interval`.
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Sends `outgoing` to `to` and waits for the exchange to finish.
    ///
    /// Fire-and-forget: failures are logged, never returned.
    pub fn send(&self, to: &Address, outgoing: &Outgoing) {
        if let Err(e) = self.try_send(to, outgoing) {
            warn!(to = %to, error = %e, "send failed");
        }
    }

    /// Like [`send`](Self::send), but reports setup failures.
    ///
    /// Failures after the connection is registered (refused connect, peer
    /// closing early, malformed response) are logged by the multiplexer and
    /// still return `Ok`.
    pub fn try_send(&self, to: &Address, outgoing: &Outgoing) -> ClientResult<()> {
        let addr = to.resolve()?;
        let request = outgoing.to_frame()?.encode()?;

        let mut mux = Multiplexer::new()?;
        let stream = TcpStream::connect(addr)?;
        mux.register(
            stream,
            addr,
            CONNECTING_INTEREST,
            ClientConnection::new(addr, request),
        )?;
        debug!(%to, "connecting");

        while !mux.is_empty() {
            for ready in mux.wait(Some(self.poll_interval))? {
                if let Ready::Connection(token, readiness) = ready {
                    mux.dispatch(token, readiness);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oink_core::Payload;
    use oink_server::{ServerAcceptor, ServerConfig, inbound_channel};
    use std::time::Instant;

    #[test]
    fn binary_frame_uses_custom_type() {
        let frame = Outgoing::binary(b"oink".to_vec()).to_frame().unwrap();
        assert_eq!(frame.header.content_type, CLIENT_BINARY_CONTENT_TYPE);
        assert_eq!(frame.header.content_encoding, "binary");
        assert_eq!(frame.content, b"oink");
    }

    #[test]
    fn delivers_message_to_listener() {
        let (sink, inbox) = inbound_channel();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        let mut handle = ServerAcceptor::bind(&config, sink).unwrap().spawn().unwrap();
        let to = Address::from(handle.local_addr());

        let payload = Payload::new(to.clone(), Address::localhost(1), "oink!");
        let dispatcher = ClientDispatcher::new(Duration::from_millis(100));
        dispatcher
            .try_send(&to, &Request::message(payload.clone()).into())
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = Vec::new();
        while received.is_empty() && Instant::now() < deadline {
            received = inbox.drain();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(received, vec![payload]);
        handle.stop().unwrap();
    }

    #[test]
    fn search_and_binary_complete() {
        let (sink, inbox) = inbound_channel();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        let mut handle = ServerAcceptor::bind(&config, sink).unwrap().spawn().unwrap();
        let to = Address::from(handle.local_addr());
        let dispatcher = ClientDispatcher::new(Duration::from_millis(100));

        dispatcher
            .try_send(&to, &Request::search("morpheus").into())
            .unwrap();
        dispatcher
            .try_send(&to, &Outgoing::binary(b"0123456789abc".to_vec()))
            .unwrap();

        assert!(inbox.drain().is_empty());
        handle.stop().unwrap();
    }

    #[test]
    fn refused_connection_returns() {
        // Bind then drop to get a port with nobody listening.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let dispatcher = ClientDispatcher::new(Duration::from_millis(100));
        dispatcher.send(&Address::localhost(port), &Request::search("ring").into());
    }

    #[test]
    fn unresolvable_host_is_reported() {
        let dispatcher = ClientDispatcher::default();
        let to = Address::new("no-such-host.invalid", 49000);
        assert!(dispatcher.try_send(&to, &Request::search("ring").into()).is_err());
        dispatcher.send(&to, &Request::search("ring").into());
    }
}
