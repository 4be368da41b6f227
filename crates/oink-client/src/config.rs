//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/oink/config.toml` by default. Every field has a default, so an
//! empty or missing file is valid.

use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use oink_core::{
    Address, DEFAULT_PORT, DEFAULT_REPLY_MARKER, DEFAULT_SCAN_MARKER, DiscoveryMarkers, local_ip,
};

use crate::error::{ClientError, ClientResult};
use crate::pool::DEFAULT_MAX_CONCURRENT_SENDS;

/// Nicknames picked from when none is configured.
pub const NICKNAMES: [&str; 11] = [
    "piggy", "oinker", "gus", "snorty", "hogg", "mudroe", "pork chop", "julianne", "hamlet",
    "truffle", "babe",
];

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the oink client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// This peer's identity and listening address.
    pub node: NodeSettings,

    /// Peer discovery settings.
    pub discovery: DiscoverySettings,

    /// Outbound send settings.
    pub dispatch: DispatchSettings,
}

/// This peer's identity and listening address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Host to listen on and advertise; detected when unset.
    pub host: Option<String>,

    /// Port to listen on; also the port scans target.
    pub port: u16,

    /// Use the loopback address instead of the detected one.
    pub use_localhost: bool,

    /// Name sent with discovery payloads; picked at random when unset.
    pub nickname: Option<String>,

    /// Maximum inbound connections held open at once.
    pub max_connections: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            use_localhost: false,
            nickname: None,
            max_connections: 1024,
        }
    }
}

/// Peer discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Text of scan payloads.
    pub scan_marker: String,

    /// Text of reply payloads.
    pub reply_marker: String,

    /// First host number scanned in the local `/24`.
    pub first_host: u8,

    /// Last host number scanned, inclusive.
    pub last_host: u8,

    /// Seconds between scans in `listen --scan`.
    pub scan_interval_secs: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            scan_marker: DEFAULT_SCAN_MARKER.to_string(),
            reply_marker: DEFAULT_REPLY_MARKER.to_string(),
            first_host: 1,
            last_host: 254,
            scan_interval_secs: 5,
        }
    }
}

impl DiscoverySettings {
    /// Markers as used by the node.
    pub fn markers(&self) -> DiscoveryMarkers {
        DiscoveryMarkers {
            scan: self.scan_marker.clone(),
            reply: self.reply_marker.clone(),
        }
    }

    /// Hosts a scan covers.
    pub fn scan_range(&self) -> RangeInclusive<u8> {
        self.first_host..=self.last_host
    }

    /// Delay between periodic scans.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

/// Outbound send settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Sends running at once; extra sends queue.
    pub max_concurrent_sends: usize,

    /// Upper bound on one readiness wait while sending, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_concurrent_sends: DEFAULT_MAX_CONCURRENT_SENDS,
            poll_interval_ms: 1000,
        }
    }
}

impl DispatchSettings {
    /// Readiness wait bound.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oink")
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> ClientResult<()> {
        let discovery = &self.discovery;
        if discovery.scan_marker.is_empty() || discovery.reply_marker.is_empty() {
            return Err(ClientError::config("discovery markers must not be empty"));
        }
        if discovery.scan_marker == discovery.reply_marker {
            return Err(ClientError::config(
                "scan_marker and reply_marker must differ",
            ));
        }
        if discovery.first_host > discovery.last_host {
            return Err(ClientError::config(format!(
                "first_host {} is after last_host {}",
                discovery.first_host, discovery.last_host
            )));
        }
        if discovery.scan_interval_secs == 0 {
            return Err(ClientError::config("scan_interval_secs must be positive"));
        }
        if self.dispatch.max_concurrent_sends == 0 {
            return Err(ClientError::config("max_concurrent_sends must be positive"));
        }
        Ok(())
    }

    /// This peer's address: configured host, loopback, or detected.
    pub fn address(&self) -> Address {
        let host = match &self.node.host {
            Some(host) => host.clone(),
            None if self.node.use_localhost => Ipv4Addr::LOCALHOST.to_string(),
            None => local_ip().to_string(),
        };
        Address::new(host, self.node.port)
    }

    /// Configured nickname, or one picked from [`NICKNAMES`].
    pub fn nickname(&self) -> String {
        match &self.node.nickname {
            Some(nickname) => nickname.clone(),
            None => {
                let pick = Utc::now().timestamp_subsec_nanos() as usize % NICKNAMES.len();
                NICKNAMES[pick].to_string()
            }
        }
    }
}
