//! One inbound exchange: read a request, answer it, close.

use std::fmt;
use std::net::SocketAddr;

use mio::Interest;
use tracing::{debug, trace};

use oink_protocol::{Body, DecodePhase, FrameDecoder, Outbox};

use crate::error::ServerError;
use crate::handler;
use crate::reactor::{Next, Readiness, Session, Transport};
use crate::sink::InboundSink;

/// Where a server-side connection is in its exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    AwaitingHeaderLen,
    AwaitingHeader,
    AwaitingBody,
    ComposingResponse,
    Writing,
    Closed,
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingHeaderLen => "awaiting-header-len",
            Self::AwaitingHeader => "awaiting-header",
            Self::AwaitingBody => "awaiting-body",
            Self::ComposingResponse => "composing-response",
            Self::Writing => "writing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
enum ServerState {
    Receiving(FrameDecoder),
    Composing(Body),
    Writing(Outbox),
    Closed,
}

/// Server side of one connection.
#[derive(Debug)]
pub struct ServerConnection {
    peer: SocketAddr,
    state: ServerState,
    sink: InboundSink,
}

impl ServerConnection {
    /// Creates a connection waiting for its request.
    pub fn new(peer: SocketAddr, sink: InboundSink) -> Self {
        Self {
            peer,
            state: ServerState::Receiving(FrameDecoder::new()),
            sink,
        }
    }

    /// Remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current phase.
    pub fn phase(&self) -> ServerPhase {
        match &self.state {
            ServerState::Receiving(decoder) => match decoder.phase() {
                DecodePhase::HeaderLen => ServerPhase::AwaitingHeaderLen,
                DecodePhase::Header => ServerPhase::AwaitingHeader,
                DecodePhase::Body => ServerPhase::AwaitingBody,
            },
            ServerState::Composing(_) => ServerPhase::ComposingResponse,
            ServerState::Writing(_) => ServerPhase::Writing,
            ServerState::Closed => ServerPhase::Closed,
        }
    }

    fn receive<T: Transport>(&mut self, io: &mut T) -> Result<Next, ServerError> {
        let ServerState::Receiving(decoder) = &mut self.state else {
            return Ok(Next::Wait(Interest::READABLE));
        };
        let Some(frame) = decoder.receive(io)? else {
            trace!(peer = %self.peer, phase = %self.phase(), "request incomplete");
            return Ok(Next::Wait(Interest::READABLE));
        };

        let body = frame.body()?;
        debug!(
            peer = %self.peer,
            content_type = %frame.header.content_type,
            length = frame.header.content_length,
            "request received"
        );
        if let Some(payload) = handler::inbound_payload(&body) {
            self.sink.deliver(payload);
        }
        self.state = ServerState::Composing(body);
        Ok(Next::Wait(Interest::WRITABLE))
    }

    fn write<T: Transport>(&mut self, io: &mut T) -> Result<Next, ServerError> {
        if let ServerState::Composing(body) = &self.state {
            let bytes = handler::respond(body)?.encode()?;
            self.state = ServerState::Writing(Outbox::new(bytes));
        }
        let ServerState::Writing(outbox) = &mut self.state else {
            return Ok(Next::Wait(Interest::WRITABLE));
        };
        if outbox.write_to(io)? {
            debug!(peer = %self.peer, "response sent");
            self.state = ServerState::Closed;
            Ok(Next::Close)
        } else {
            Ok(Next::Wait(Interest::WRITABLE))
        }
    }
}

impl Session for ServerConnection {
    type Error = ServerError;

    fn on_ready<T: Transport>(&mut self, io: &mut T, ready: Readiness) -> Result<Next, ServerError> {
        match self.state {
            ServerState::Receiving(_) if ready.readable => self.receive(io),
            ServerState::Receiving(_) => Ok(Next::Wait(Interest::READABLE)),
            ServerState::Composing(_) | ServerState::Writing(_) if ready.writable => {
                self.write(io)
            }
            ServerState::Composing(_) | ServerState::Writing(_) => {
                Ok(Next::Wait(Interest::WRITABLE))
            }
            ServerState::Closed => Ok(Next::Close),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::inbound_channel;
    use oink_core::{Address, Payload};
    use oink_protocol::{
        CLIENT_BINARY_CONTENT_TYPE, Frame, ProtocolError, Request, Response,
        SERVER_BINARY_CONTENT_TYPE,
    };
    use std::collections::VecDeque;
    use std::io::{self, ErrorKind, Read, Write};

    /// Scripted transport: reads come from queued chunks, writes accept at
    /// most `write_budget` bytes per readiness round.
    #[derive(Default)]
    struct MockIo {
        chunks: VecDeque<Vec<u8>>,
        eof: bool,
        written: Vec<u8>,
        write_budget: Option<usize>,
    }

    impl MockIo {
        fn push(&mut self, bytes: &[u8]) {
            self.chunks.push_back(bytes.to_vec());
        }
    }

    impl Read for MockIo {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(mut chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        chunk.drain(..n);
                        self.chunks.push_front(chunk);
                    }
                    Ok(n)
                }
                None if self.eof => Ok(0),
                None => Err(ErrorKind::WouldBlock.into()),
            }
        }
    }

    impl Write for MockIo {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = match &mut self.write_budget {
                Some(0) => return Err(ErrorKind::WouldBlock.into()),
                Some(budget) => {
                    let n = buf.len().min(*budget);
                    *budget -= n;
                    n
                }
                None => buf.len(),
            };
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MockIo {
        fn take_error(&self) -> io::Result<Option<io::Error>> {
            Ok(None)
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn decode_response(bytes: &[u8]) -> Frame {
        let mut decoder = FrameDecoder::new();
        decoder.extend(bytes);
        decoder.decode().unwrap().unwrap()
    }

    #[test]
    fn answers_search_after_full_request() {
        let (sink, inbox) = inbound_channel();
        let mut conn = ServerConnection::new(peer(), sink);
        let mut io = MockIo::default();
        let request = Request::search("morpheus").to_frame().unwrap().encode().unwrap();

        io.push(&request[..1]);
        assert_eq!(
            conn.on_ready(&mut io, Readiness::READABLE).unwrap(),
            Next::Wait(Interest::READABLE)
        );
        assert_eq!(conn.phase(), ServerPhase::AwaitingHeaderLen);

        io.push(&request[1..5]);
        conn.on_ready(&mut io, Readiness::READABLE).unwrap();
        assert_eq!(conn.phase(), ServerPhase::AwaitingHeader);

        // Writable before the request is complete writes nothing.
        conn.on_ready(&mut io, Readiness::WRITABLE).unwrap();
        assert!(io.written.is_empty());

        io.push(&request[5..]);
        assert_eq!(
            conn.on_ready(&mut io, Readiness::READABLE).unwrap(),
            Next::Wait(Interest::WRITABLE)
        );
        assert_eq!(conn.phase(), ServerPhase::ComposingResponse);
        assert!(io.written.is_empty());

        assert_eq!(
            conn.on_ready(&mut io, Readiness::WRITABLE).unwrap(),
            Next::Close
        );
        assert_eq!(conn.phase(), ServerPhase::Closed);

        let response: Response = decode_response(&io.written).json_body().unwrap();
        assert_eq!(response.result, "Follow the white rabbit. \u{1f430}");
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn message_delivered_once_and_acknowledged() {
        let (sink, inbox) = inbound_channel();
        let mut conn = ServerConnection::new(peer(), sink);
        let mut io = MockIo::default();
        let payload = Payload::new(Address::localhost(49001), Address::localhost(49000), "hi");
        io.push(&Request::message(payload.clone()).to_frame().unwrap().encode().unwrap());

        conn.on_ready(&mut io, Readiness::READABLE).unwrap();
        conn.on_ready(&mut io, Readiness::WRITABLE).unwrap();

        let response: Response = decode_response(&io.written).json_body().unwrap();
        assert!(response.is_acknowledged());
        assert_eq!(inbox.drain(), vec![payload]);
    }

    #[test]
    fn partial_writes_resume() {
        let (sink, _inbox) = inbound_channel();
        let mut conn = ServerConnection::new(peer(), sink);
        let mut io = MockIo {
            write_budget: Some(5),
            ..MockIo::default()
        };
        io.push(&Request::search("ring").to_frame().unwrap().encode().unwrap());
        conn.on_ready(&mut io, Readiness::READABLE).unwrap();

        assert_eq!(
            conn.on_ready(&mut io, Readiness::WRITABLE).unwrap(),
            Next::Wait(Interest::WRITABLE)
        );
        assert_eq!(conn.phase(), ServerPhase::Writing);
        assert_eq!(io.written.len(), 5);

        io.write_budget = None;
        assert_eq!(
            conn.on_ready(&mut io, Readiness::WRITABLE).unwrap(),
            Next::Close
        );
        let response: Response = decode_response(&io.written).json_body().unwrap();
        assert_eq!(response.result, "In the caves beneath the Misty Mountains. \u{1f48d}");
    }

    #[test]
    fn binary_request_echoed() {
        let (sink, _inbox) = inbound_channel();
        let mut conn = ServerConnection::new(peer(), sink);
        let mut io = MockIo::default();
        let frame = Frame::binary(CLIENT_BINARY_CONTENT_TYPE, b"\x00\x01oinkoinkoink".to_vec());
        io.push(&frame.encode().unwrap());

        conn.on_ready(&mut io, Readiness::READABLE).unwrap();
        conn.on_ready(&mut io, Readiness::WRITABLE).unwrap();

        let response = decode_response(&io.written);
        assert_eq!(response.header.content_type, SERVER_BINARY_CONTENT_TYPE);
        assert_eq!(response.content, b"First 10 bytes of request: \x00\x01oinkoink");
    }

    #[test]
    fn peer_closing_early_is_an_error() {
        let (sink, _inbox) = inbound_channel();
        let mut conn = ServerConnection::new(peer(), sink);
        let mut io = MockIo {
            eof: true,
            ..MockIo::default()
        };
        io.push(&[0]);

        let err = conn.on_ready(&mut io, Readiness::READABLE).unwrap_err();
        assert!(matches!(
            err,
            ServerError::Protocol(ProtocolError::PeerClosed {
                expected: 1,
                buffered: 1
            })
        ));
        assert!(io.written.is_empty());
    }

    #[test]
    fn malformed_header_is_an_error() {
        let (sink, _inbox) = inbound_channel();
        let mut conn = ServerConnection::new(peer(), sink);
        let mut io = MockIo::default();
        let header = br#"{"byteorder":"little"}"#;
        io.push(&(header.len() as u16).to_be_bytes());
        io.push(header);

        let err = conn.on_ready(&mut io, Readiness::READABLE).unwrap_err();
        assert!(matches!(
            err,
            ServerError::Protocol(ProtocolError::MissingHeaderField("content-length"))
        ));
    }
}
