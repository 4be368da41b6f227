//! Outbound side of one exchange: connect, write the request, read the
//! response, close.

use std::net::SocketAddr;

use mio::Interest;
use tracing::{debug, info, trace};

use oink_protocol::{DecodePhase, Frame, FrameDecoder, Outbox, Response};
use oink_server::{Next, Readiness, Session, Transport};

use crate::error::ClientError;

/// Interest while the connect is in flight.
pub const CONNECTING_INTEREST: Interest = Interest::READABLE.add(Interest::WRITABLE);

/// Where a client-side connection is in its exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Connecting,
    Writing,
    AwaitingHeaderLen,
    AwaitingHeader,
    AwaitingBody,
    Closed,
}

#[derive(Debug)]
enum ClientState {
    Connecting { request: Vec<u8> },
    Writing(Outbox),
    Receiving(FrameDecoder),
    Closed,
}

/// Client side of one connection.
#[derive(Debug)]
pub struct ClientConnection {
    peer: SocketAddr,
    state: ClientState,
}

impl ClientConnection {
    /// Creates a connection that will send the encoded `request` once the
    /// connect completes.
    pub fn new(peer: SocketAddr, request: Vec<u8>) -> Self {
        Self {
            peer,
            state: ClientState::Connecting { request },
        }
    }

    /// Current phase.
    pub fn phase(&self) -> ClientPhase {
        match &self.state {
            ClientState::Connecting { .. } => ClientPhase::Connecting,
            ClientState::Writing(_) => ClientPhase::Writing,
            ClientState::Receiving(decoder) => match decoder.phase() {
                DecodePhase::HeaderLen => ClientPhase::AwaitingHeaderLen,
                DecodePhase::Header => ClientPhase::AwaitingHeader,
                DecodePhase::Body => ClientPhase::AwaitingBody,
            },
            ClientState::Closed => ClientPhase::Closed,
        }
    }

    fn connect<T: Transport>(&mut self, io: &mut T) -> Result<Next, ClientError> {
        if let Some(err) = io.take_error()? {
            return Err(ClientError::Connection(err));
        }
        if !io.is_connected() {
            trace!(peer = %self.peer, "connect still in progress");
            return Ok(Next::Wait(CONNECTING_INTEREST));
        }
        if let ClientState::Connecting { request } = &mut self.state {
            debug!(peer = %self.peer, "connected");
            self.state = ClientState::Writing(Outbox::new(std::mem::take(request)));
        }
        self.write(io)
    }

    fn write<T: Transport>(&mut self, io: &mut T) -> Result<Next, ClientError> {
        let ClientState::Writing(outbox) = &mut self.state else {
            return Ok(Next::Wait(CONNECTING_INTEREST));
        };
        if outbox.write_to(io)? {
            trace!(peer = %self.peer, "request sent");
            self.state = ClientState::Receiving(FrameDecoder::new());
            Ok(Next::Wait(Interest::READABLE))
        } else {
            Ok(Next::Wait(CONNECTING_INTEREST))
        }
    }

    fn receive<T: Transport>(&mut self, io: &mut T) -> Result<Next, ClientError> {
        let ClientState::Receiving(decoder) = &mut self.state else {
            return Ok(Next::Wait(Interest::READABLE));
        };
        match decoder.receive(io)? {
            Some(frame) => {
                log_response(self.peer, &frame);
                self.state = ClientState::Closed;
                Ok(Next::Close)
            }
            None => Ok(Next::Wait(Interest::READABLE)),
        }
    }
}

fn log_response(peer: SocketAddr, frame: &Frame) {
    if frame.header.is_json() {
        match frame.json_body::<Response>() {
            Ok(response) => info!(%peer, result = %response.result, "response received"),
            Err(e) => debug!(%peer, error = %e, "response is not a result object"),
        }
    } else {
        info!(
            %peer,
            content_type = %frame.header.content_type,
            length = frame.content.len(),
            "binary response received"
        );
    }
}

impl Session for ClientConnection {
    type Error = ClientError;

    fn on_ready<T: Transport>(&mut self, io: &mut T, ready: Readiness) -> Result<Next, ClientError> {
        match self.state {
            ClientState::Connecting { .. } if ready.writable => self.connect(io),
            ClientState::Connecting { .. } => Ok(Next::Wait(CONNECTING_INTEREST)),
            ClientState::Writing(_) if ready.writable => self.write(io),
            ClientState::Writing(_) => Ok(Next::Wait(CONNECTING_INTEREST)),
            ClientState::Receiving(_) if ready.readable => self.receive(io),
            ClientState::Receiving(_) => Ok(Next::Wait(Interest::READABLE)),
            ClientState::Closed => Ok(Next::Close),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oink_protocol::{Frame, ProtocolError, Request};
    use std::collections::VecDeque;
    use std::io::{self, ErrorKind, Read, Write};

    /// Scripted socket for the outbound side.
    #[derive(Default)]
    struct FakeSocket {
        inbound: VecDeque<u8>,
        eof: bool,
        sent: Vec<u8>,
        connected: bool,
        refused: bool,
    }

    impl Read for FakeSocket {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.inbound.is_empty() {
                return if self.eof {
                    Ok(0)
                } else {
                    Err(ErrorKind::WouldBlock.into())
                };
            }
            let n = buf.len().min(self.inbound.len());
            for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for FakeSocket {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for FakeSocket {
        fn take_error(&self) -> io::Result<Option<io::Error>> {
            Ok(self
                .refused
                .then(|| io::Error::from(ErrorKind::ConnectionRefused)))
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:49000".parse().unwrap()
    }

    fn request() -> Vec<u8> {
        Request::search("ring")
            .to_frame()
            .unwrap()
            .encode()
            .unwrap()
    }

    #[test]
    fn full_exchange() {
        let mut conn = ClientConnection::new(peer(), request());
        let mut socket = FakeSocket::default();

        // Not connected yet: nothing is written.
        assert_eq!(
            conn.on_ready(&mut socket, Readiness::WRITABLE).unwrap(),
            Next::Wait(CONNECTING_INTEREST)
        );
        assert_eq!(conn.phase(), ClientPhase::Connecting);
        assert!(socket.sent.is_empty());

        socket.connected = true;
        assert_eq!(
            conn.on_ready(&mut socket, Readiness::WRITABLE).unwrap(),
            Next::Wait(Interest::READABLE)
        );
        assert_eq!(socket.sent, request());
        assert_eq!(conn.phase(), ClientPhase::AwaitingHeaderLen);

        let response = Frame::json(&Response::new("In the caves"))
            .unwrap()
            .encode()
            .unwrap();
        socket.inbound.extend(&response[..4]);
        assert_eq!(
            conn.on_ready(&mut socket, Readiness::READABLE).unwrap(),
            Next::Wait(Interest::READABLE)
        );
        assert_eq!(conn.phase(), ClientPhase::AwaitingHeader);

        socket.inbound.extend(&response[4..]);
        assert_eq!(
            conn.on_ready(&mut socket, Readiness::READABLE).unwrap(),
            Next::Close
        );
        assert_eq!(conn.phase(), ClientPhase::Closed);
    }

    #[test]
    fn request_written_exactly_once() {
        let mut conn = ClientConnection::new(peer(), request());
        let mut socket = FakeSocket {
            connected: true,
            ..FakeSocket::default()
        };
        conn.on_ready(&mut socket, Readiness::WRITABLE).unwrap();
        conn.on_ready(&mut socket, Readiness::BOTH).unwrap();
        conn.on_ready(&mut socket, Readiness::WRITABLE).unwrap();
        assert_eq!(socket.sent, request());
    }

    #[test]
    fn refused_connect_is_an_error() {
        let mut conn = ClientConnection::new(peer(), request());
        let mut socket = FakeSocket {
            refused: true,
            ..FakeSocket::default()
        };
        let err = conn.on_ready(&mut socket, Readiness::BOTH).unwrap_err();
        assert!(matches!(err, ClientError::Connection(e) if e.kind() == ErrorKind::ConnectionRefused));
        assert!(socket.sent.is_empty());
    }

    #[test]
    fn peer_closing_before_response() {
        let mut conn = ClientConnection::new(peer(), request());
        let mut socket = FakeSocket {
            connected: true,
            ..FakeSocket::default()
        };
        conn.on_ready(&mut socket, Readiness::WRITABLE).unwrap();

        socket.eof = true;
        let err = conn.on_ready(&mut socket, Readiness::READABLE).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::PeerClosed {
                expected: 2,
                buffered: 0
            })
        ));
    }
}
