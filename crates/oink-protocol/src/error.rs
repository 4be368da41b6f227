//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while framing or parsing messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Encoded header does not fit the 2-byte length prefix.
    #[error("header too large: {size} bytes (max: {max})")]
    HeaderTooLarge { size: usize, max: usize },

    /// Declared `content-length` differs from the content handed to the encoder.
    #[error("content-length mismatch: header declares {declared} bytes, content has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Header is not a JSON object.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A required header field is absent.
    #[error("missing required header '{0}'")]
    MissingHeaderField(&'static str),

    /// The content encoding cannot be used to decode JSON.
    #[error("unsupported content encoding '{0}'")]
    UnsupportedEncoding(String),

    /// JSON encoding or decoding failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The peer closed the connection before a full frame arrived.
    #[error("peer closed: expected {expected} more bytes, buffered {buffered}")]
    PeerClosed { expected: usize, buffered: usize },

    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Creates a malformed header error.
    pub fn malformed_header(message: impl Into<String>) -> Self {
        Self::MalformedHeader(message.into())
    }
}
