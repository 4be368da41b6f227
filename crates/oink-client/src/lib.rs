//! CLI, send path, dispatch pool, peer node
//!
//! This crate provides the `oink` command-line interface and the [`Node`]
//! type applications embed.

pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod node;
pub mod pool;

pub use cli::Cli;
pub use config::ClientConfig;
pub use connection::{ClientConnection, ClientPhase};
pub use dispatcher::{ClientDispatcher, Outgoing};
pub use error::{ClientError, ClientResult};
pub use node::{Inbound, Node};
pub use pool::{Dispatch, DispatchPool};
