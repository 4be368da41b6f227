//! Client error types.

use thiserror::Error;

use oink_core::AddressError;
use oink_protocol::ProtocolError;
use oink_server::ServerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Address could not be parsed or resolved.
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Non-blocking connect failed.
    #[error("connection error: {0}")]
    Connection(std::io::Error),

    /// Protocol/framing error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The listener could not be started.
    #[error("not listening on {0}")]
    NotListening(String),

    /// Listener error.
    #[error("listener error: {0}")]
    Listener(#[from] ServerError),

    /// Tracing could not be initialized.
    #[error("tracing error: {0}")]
    Tracing(#[from] oink_core::TracingError),
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
