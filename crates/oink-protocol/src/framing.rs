//! Length-prefixed frame codec.
//!
//! Every frame is a 2-byte big-endian header length, a UTF-8 JSON header,
//! then the raw content:
//!
//! ```text
//! +-------------+-------------------------+------------------+
//! | hlen (2 BE) |  JSON header (hlen B)   |  content (N B)   |
//! +-------------+-------------------------+------------------+
//! ```
//!
//! The header carries `byteorder`, `content-type`, `content-encoding` and
//! `content-length`; `content-length` is always `N`.
//!
//! Decoding is incremental. [`FrameDecoder`] accumulates bytes from a
//! non-blocking socket and only consumes them once the current phase
//! (prefix, header, body) has everything it needs, so frames may arrive split
//! at any byte boundary.
//!
//! Neither the header length nor `content-length` is bounded when decoding:
//! a peer may declare a body of any size and the decoder will buffer until it
//! arrives or the peer closes.

use std::io::{ErrorKind, Read, Write};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};

/// Size of the header length prefix.
pub const HEADER_PREFIX_LEN: usize = 2;

/// Largest header the prefix can describe.
pub const MAX_HEADER_LEN: usize = u16::MAX as usize;

/// Content type of JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "text/json";

/// Encoding used for JSON bodies and headers.
pub const UTF8_ENCODING: &str = "utf-8";

/// Encoding tag of opaque bodies.
pub const BINARY_ENCODING: &str = "binary";

/// Bytes requested from the socket per `read` call.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Header keys that must be present, in the order they are checked.
pub const REQUIRED_HEADER_FIELDS: [&str; 4] = [
    "byteorder",
    "content-length",
    "content-type",
    "content-encoding",
];

/// Byte order of this host, as advertised in the `byteorder` header field.
pub fn native_byteorder() -> &'static str {
    if cfg!(target_endian = "big") {
        "big"
    } else {
        "little"
    }
}

/// The JSON header of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Sender's native byte order; informational only.
    pub byteorder: String,
    /// `text/json` or an opaque binary tag.
    #[serde(rename = "content-type")]
    pub content_type: String,
    /// Text encoding of JSON content, or a tag for binary content.
    #[serde(rename = "content-encoding")]
    pub content_encoding: String,
    /// Exact number of content bytes following the header.
    #[serde(rename = "content-length")]
    pub content_length: usize,
}

impl Header {
    /// Creates a header advertising this host's byte order.
    pub fn new(
        content_type: impl Into<String>,
        content_encoding: impl Into<String>,
        content_length: usize,
    ) -> Self {
        Self {
            byteorder: native_byteorder().to_string(),
            content_type: content_type.into(),
            content_encoding: content_encoding.into(),
            content_length,
        }
    }

    /// Whether the content is JSON.
    pub fn is_json(&self) -> bool {
        self.content_type == JSON_CONTENT_TYPE
    }

    /// Parses a header, checking required fields before typing them.
    fn parse(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(ProtocolError::malformed_header(format!(
                    "expected a JSON object, got {other}"
                )));
            }
        };
        check_required(&fields)?;
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

fn check_required(fields: &Map<String, Value>) -> ProtocolResult<()> {
    match REQUIRED_HEADER_FIELDS
        .into_iter()
        .find(|name| !fields.contains_key(*name))
    {
        Some(missing) => Err(ProtocolError::MissingHeaderField(missing)),
        None => Ok(()),
    }
}

/// A decoded frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// `text/json` content, decoded.
    Json(Value),
    /// Any other content type, untouched.
    Binary(Vec<u8>),
}

/// One header plus its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub content: Vec<u8>,
}

impl Frame {
    /// Creates a frame whose `content-length` matches `content`.
    pub fn new(
        content_type: impl Into<String>,
        content_encoding: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            header: Header::new(content_type, content_encoding, content.len()),
            content,
        }
    }

    /// Creates a `text/json` frame.
    pub fn json<T: Serialize>(value: &T) -> ProtocolResult<Self> {
        let content = serde_json::to_vec(value)?;
        Ok(Self::new(JSON_CONTENT_TYPE, UTF8_ENCODING, content))
    }

    /// Creates an opaque frame with a custom content type.
    pub fn binary(content_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self::new(content_type, BINARY_ENCODING, content)
    }

    /// Encodes the frame for the wire.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode(&self.header, &self.content)
    }

    /// Decodes the body according to the header's content type.
    pub fn body(&self) -> ProtocolResult<Body> {
        if self.header.is_json() {
            decode_json(&self.content, &self.header.content_encoding).map(Body::Json)
        } else {
            Ok(Body::Binary(self.content.clone()))
        }
    }

    /// Decodes a JSON body straight into `T`.
    pub fn json_body<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        check_json_encoding(&self.header.content_encoding)?;
        Ok(serde_json::from_slice(&self.content)?)
    }
}

fn check_json_encoding(encoding: &str) -> ProtocolResult<()> {
    if encoding.eq_ignore_ascii_case("utf-8") || encoding.eq_ignore_ascii_case("utf8") {
        Ok(())
    } else {
        Err(ProtocolError::UnsupportedEncoding(encoding.to_string()))
    }
}

fn decode_json(content: &[u8], encoding: &str) -> ProtocolResult<Value> {
    check_json_encoding(encoding)?;
    Ok(serde_json::from_slice(content)?)
}

/// Encodes `header` and `content` into one frame.
///
/// # Example
///
/// ```rust
/// use oink_protocol::{Header, encode};
///
/// let header = Header::new("text/json", "utf-8", 2);
/// let bytes = encode(&header, b"{}").unwrap();
/// let prefix = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
/// assert_eq!(bytes.len(), 2 + prefix + 2);
/// ```
pub fn encode(header: &Header, content: &[u8]) -> ProtocolResult<Vec<u8>> {
    if header.content_length != content.len() {
        return Err(ProtocolError::LengthMismatch {
            declared: header.content_length,
            actual: content.len(),
        });
    }

    let json = serde_json::to_vec(header)?;
    let Ok(len) = u16::try_from(json.len()) else {
        return Err(ProtocolError::HeaderTooLarge {
            size: json.len(),
            max: MAX_HEADER_LEN,
        });
    };

    let mut buffer = Vec::with_capacity(HEADER_PREFIX_LEN + json.len() + content.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    buffer.extend_from_slice(content);
    Ok(buffer)
}

/// Which part of a frame the decoder is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePhase {
    /// The 2-byte prefix.
    HeaderLen,
    /// The JSON header.
    Header,
    /// The content.
    Body,
}

#[derive(Debug)]
enum Phase {
    HeaderLen,
    Header { len: usize },
    Body { header: Header },
}

/// What one [`FrameDecoder::read_from`] call observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Bytes appended to the buffer.
    pub bytes: usize,
    /// The reader reported end of stream.
    pub eof: bool,
}

/// Incremental frame decoder over a receive buffer.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    phase: Phase,
    eof: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates an empty decoder waiting for a header length.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            phase: Phase::HeaderLen,
            eof: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> DecodePhase {
        match self.phase {
            Phase::HeaderLen => DecodePhase::HeaderLen,
            Phase::Header { .. } => DecodePhase::Header,
            Phase::Body { .. } => DecodePhase::Body,
        }
    }

    /// Bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes the current phase still needs before it can make progress.
    pub fn missing(&self) -> usize {
        let needed = match &self.phase {
            Phase::HeaderLen => HEADER_PREFIX_LEN,
            Phase::Header { len } => *len,
            Phase::Body { header } => header.content_length,
        };
        needed.saturating_sub(self.buffer.len())
    }

    /// Whether the reader has reported end of stream.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Appends received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Reads until the reader would block or reports end of stream.
    ///
    /// `Interrupted` is retried; other IO errors are returned.
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> ProtocolResult<ReadOutcome> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut bytes = 0;
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(ReadOutcome { bytes, eof: true });
                }
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    bytes += n;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return Ok(ReadOutcome { bytes, eof: false });
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Advances through as many phases as the buffer allows.
    ///
    /// Returns `Ok(None)` when more bytes are needed; nothing is consumed for
    /// a phase that cannot complete yet.
    pub fn decode(&mut self) -> ProtocolResult<Option<Frame>> {
        loop {
            let next = match &self.phase {
                Phase::HeaderLen if self.buffer.len() >= HEADER_PREFIX_LEN => {
                    let len = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;
                    self.buffer.drain(..HEADER_PREFIX_LEN);
                    Phase::Header { len }
                }
                Phase::Header { len } if self.buffer.len() >= *len => {
                    let len = *len;
                    let header = Header::parse(&self.buffer[..len])?;
                    self.buffer.drain(..len);
                    Phase::Body { header }
                }
                Phase::Body { header } if self.buffer.len() >= header.content_length => {
                    let header = header.clone();
                    let content = self.buffer.drain(..header.content_length).collect();
                    self.phase = Phase::HeaderLen;
                    return Ok(Some(Frame { header, content }));
                }
                _ => return Ok(None),
            };
            self.phase = next;
        }
    }

    /// Reads what is available and tries to complete a frame.
    ///
    /// End of stream before a full frame is [`ProtocolError::PeerClosed`].
    pub fn receive<R: Read>(&mut self, reader: &mut R) -> ProtocolResult<Option<Frame>> {
        let outcome = self.read_from(reader)?;
        match self.decode()? {
            Some(frame) => Ok(Some(frame)),
            None if outcome.eof => Err(ProtocolError::PeerClosed {
                expected: self.missing(),
                buffered: self.buffered(),
            }),
            None => Ok(None),
        }
    }
}

/// Pending outbound bytes, drained from the front as the socket accepts them.
#[derive(Debug, Default)]
pub struct Outbox {
    buffer: Vec<u8>,
    written: usize,
}

impl Outbox {
    /// Creates an outbox holding `bytes`.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            buffer: bytes,
            written: 0,
        }
    }

    /// Bytes not yet written.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.written
    }

    /// Whether everything has been written.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Writes until drained or the writer would block.
    ///
    /// Returns `true` once the outbox is empty.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> ProtocolResult<bool> {
        while !self.is_empty() {
            match writer.write(&self.buffer[self.written..]) {
                Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero).into()),
                Ok(n) => self.written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}
