//! Peer addresses.
//!
//! An [`Address`] is a `(host, port)` pair. Its canonical text form is
//! `"host;port"`, which is what users type and what contact stores key on.
//! Inside payloads it travels as the JSON pair `["host", port]`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between host and port in the canonical form.
pub const ADDRESS_SEPARATOR: char = ';';

/// Port peers listen on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 49000;

/// Errors produced while parsing or resolving an address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The string has no `;` separator.
    #[error("missing ';' separator in address '{0}'")]
    MissingSeparator(String),

    /// The host part is empty.
    #[error("empty host in address '{0}'")]
    EmptyHost(String),

    /// The port part is not a valid `u16`.
    #[error("invalid port '{port}' in address '{input}'")]
    InvalidPort { input: String, port: String },

    /// The host is not an IPv4 address, so it has no `/24` network.
    #[error("host '{0}' is not an IPv4 address")]
    NotIpv4(String),

    /// Name resolution produced no socket address.
    #[error("could not resolve '{0}'")]
    Unresolved(String),
}

/// A peer address: host name or IP plus TCP port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, u16)", into = "(String, u16)")]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    /// Creates an address from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Loopback address on the given port.
    pub fn localhost(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST.to_string(), port)
    }

    /// Returns the host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the same host on another port.
    pub fn with_port(&self, port: u16) -> Self {
        Self::new(self.host.clone(), port)
    }

    /// Resolves to the first socket address.
    pub fn resolve(&self) -> Result<SocketAddr, AddressError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| AddressError::Unresolved(self.to_string()))
    }

    /// Returns the first three octets of an IPv4 host.
    pub fn network_prefix(&self) -> Result<[u8; 3], AddressError> {
        let ip: Ipv4Addr = self
            .host
            .parse()
            .map_err(|_| AddressError::NotIpv4(self.host.clone()))?;
        let [a, b, c, _] = ip.octets();
        Ok([a, b, c])
    }

    /// Returns the address of `host` in this address's `/24`, same port.
    pub fn sibling(&self, host: u8) -> Result<Self, AddressError> {
        let [a, b, c] = self.network_prefix()?;
        Ok(Self::new(Ipv4Addr::new(a, b, c, host).to_string(), self.port))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.host, ADDRESS_SEPARATOR, self.port)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(ADDRESS_SEPARATOR)
            .ok_or_else(|| AddressError::MissingSeparator(s.to_string()))?;
        let host = host.trim();
        if host.is_empty() {
            return Err(AddressError::EmptyHost(s.to_string()));
        }
        let port = port
            .trim()
            .parse()
            .map_err(|_| AddressError::InvalidPort {
                input: s.to_string(),
                port: port.to_string(),
            })?;
        Ok(Self::new(host, port))
    }
}

impl From<(String, u16)> for Address {
    fn from((host, port): (String, u16)) -> Self {
        Self { host, port }
    }
}

impl From<Address> for (String, u16) {
    fn from(address: Address) -> Self {
        (address.host, address.port)
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Detects the IP of the interface used for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only selects a route. Falls back
/// to loopback when no route exists.
pub fn local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1))?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_semicolon() {
        let addr = Address::new("192.168.1.7", 49000);
        assert_eq!(addr.to_string(), "192.168.1.7;49000");
    }

    #[test]
    fn parse_canonical_form() {
        let addr: Address = "10.0.0.3;5000".parse().unwrap();
        assert_eq!(addr.host(), "10.0.0.3");
        assert_eq!(addr.port(), 5000);
        assert_eq!(addr.to_string().parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "10.0.0.3:5000".parse::<Address>(),
            Err(AddressError::MissingSeparator(_))
        ));
        assert!(matches!(
            ";5000".parse::<Address>(),
            Err(AddressError::EmptyHost(_))
        ));
        assert!(matches!(
            "host;70000".parse::<Address>(),
            Err(AddressError::InvalidPort { .. })
        ));
    }

    #[test]
    fn serializes_as_pair() {
        let addr = Address::new("127.0.0.1", 49000);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, r#"["127.0.0.1",49000]"#);

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn sibling_stays_in_network() {
        let addr = Address::new("192.168.4.20", 49000);
        assert_eq!(addr.network_prefix().unwrap(), [192, 168, 4]);
        assert_eq!(addr.sibling(1).unwrap().to_string(), "192.168.4.1;49000");
    }

    #[test]
    fn sibling_requires_ipv4() {
        let addr = Address::new("example.org", 49000);
        assert_eq!(
            addr.sibling(1),
            Err(AddressError::NotIpv4("example.org".into()))
        );
    }

    #[test]
    fn resolve_loopback() {
        let addr = Address::localhost(4242).resolve().unwrap();
        assert_eq!(addr.port(), 4242);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn local_ip_never_unspecified() {
        assert!(!local_ip().is_unspecified());
    }
}
