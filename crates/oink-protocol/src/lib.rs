//! Wire framing and request/response types for oink.
//!
//! # Protocol Overview
//!
//! Each TCP connection carries exactly one request frame from the client and
//! one response frame from the server, then closes. A frame is:
//! - 2 bytes: header length (u16, big-endian)
//! - N bytes: JSON header (`byteorder`, `content-type`, `content-encoding`,
//!   `content-length`)
//! - `content-length` bytes: content
//!
//! `text/json` content holds a [`Request`] (`{"action", "value"}`) or a
//! [`Response`] (`{"result"}`). Other content types are opaque.
//!
//! # Example
//!
//! ```rust
//! use oink_protocol::{FrameDecoder, Request};
//!
//! let bytes = Request::search("ring").to_frame().unwrap().encode().unwrap();
//!
//! let mut decoder = FrameDecoder::new();
//! decoder.extend(&bytes[..3]);
//! assert!(decoder.decode().unwrap().is_none());
//! decoder.extend(&bytes[3..]);
//! let frame = decoder.decode().unwrap().unwrap();
//! assert_eq!(frame.json_body::<Request>().unwrap(), Request::search("ring"));
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{
    BINARY_ENCODING, Body, DecodePhase, Frame, FrameDecoder, HEADER_PREFIX_LEN,
    JSON_CONTENT_TYPE, MAX_HEADER_LEN, Header, Outbox, READ_CHUNK_SIZE, REQUIRED_HEADER_FIELDS,
    ReadOutcome, UTF8_ENCODING, encode, native_byteorder,
};
pub use types::{
    ACKNOWLEDGED, CLIENT_BINARY_CONTENT_TYPE, Request, Response, SERVER_BINARY_CONTENT_TYPE,
};
