//! Listening side of oink: readiness multiplexer, inbound connections,
//! response policy.
//!
//! The listener runs one thread that owns a [`Multiplexer`]. Each accepted
//! connection is a [`ServerConnection`] state machine: it reads one request,
//! hands `message` payloads to an [`InboundSink`], writes one response and
//! closes.
//!
//! # Example
//!
//! ```rust,no_run
//! use oink_server::{ServerAcceptor, ServerConfig, inbound_channel};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sink, inbox) = inbound_channel();
//!     let config = ServerConfig::new("127.0.0.1:49000".parse()?);
//!     let mut handle = ServerAcceptor::bind(&config, sink)?.spawn()?;
//!
//!     for payload in inbox.drain() {
//!         println!("{}: {}", payload.from, payload.text);
//!     }
//!     handle.stop()?;
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod error;
mod handler;
mod listener;
mod reactor;
mod shutdown;
mod sink;

pub use config::ServerConfig;
pub use connection::{ServerConnection, ServerPhase};
pub use error::{ServerError, ServerResult};
pub use handler::{
    BINARY_ECHO_PREFIX, SEARCH_TABLE, inbound_payload, lookup, respond, response_for,
};
pub use listener::{LISTENER_THREAD_NAME, ListenerHandle, ServerAcceptor};
pub use reactor::{Multiplexer, Next, Readiness, Ready, Session, Transport, WAKE_TOKEN};
pub use shutdown::ShutdownToken;
pub use sink::{InboundSink, Inbox, inbound_channel};
