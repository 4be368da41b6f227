//! Listener configuration.

use std::net::{Ipv4Addr, SocketAddr};

use oink_core::{Address, DEFAULT_PORT};

use crate::error::{ServerError, ServerResult};

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listening socket binds to.
    pub bind_addr: SocketAddr,

    /// Maximum connections held open at once; extra accepts are dropped.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 1024,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration bound to `bind_addr`.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Creates a configuration for a peer address, resolving its host.
    pub fn for_address(address: &Address) -> ServerResult<Self> {
        let bind_addr = address
            .resolve()
            .map_err(|e| ServerError::config(e.to_string()))?;
        Ok(Self::new(bind_addr))
    }

    /// Builder: set max connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.max_connections, 1024);
    }

    #[test]
    fn custom_config() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let config = ServerConfig::new(addr).with_max_connections(8);
        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 8);
    }

    #[test]
    fn from_peer_address() {
        let config = ServerConfig::for_address(&Address::localhost(6000)).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:6000".parse().unwrap());
    }
}
