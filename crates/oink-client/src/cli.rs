//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use oink_core::{Address, TracingOutputFormat};

use crate::config::ClientConfig;

/// oink - LAN messaging between peers
#[derive(Debug, Parser)]
#[command(name = "oink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "OINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Own address as host;port (overrides [node] host and port)
    #[arg(long, short, env = "OINK_ADDRESS")]
    pub address: Option<Address>,

    /// Nickname sent with discovery payloads
    #[arg(long, short)]
    pub nickname: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(ref address) = self.address {
            config.node.host = Some(address.host().to_string());
            config.node.port = address.port();
        }
        if let Some(ref nickname) = self.nickname {
            config.node.nickname = Some(nickname.clone());
        }
    }
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl From<LogFormat> for TracingOutputFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Compact => Self::Compact,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Json => Self::Json,
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Listen for messages and print them until Ctrl-C
    Listen {
        /// Scan the local network periodically
        #[arg(long)]
        scan: bool,
    },

    /// Send a text message to a peer
    Send {
        /// Peer address as host;port
        to: Address,

        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Send the text as opaque bytes instead of a message
        #[arg(long)]
        binary: bool,
    },

    /// Ask a peer's answer table about a word
    Search {
        /// Peer address as host;port
        to: Address,

        /// Word to look up
        query: String,
    },

    /// Send a discovery scan to the local /24
    Scan {
        /// First host number (default from config)
        #[arg(long)]
        first: Option<u8>,

        /// Last host number, inclusive (default from config)
        #[arg(long)]
        last: Option<u8>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
