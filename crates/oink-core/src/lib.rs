//! Core types: addresses, payloads, discovery markers, tracing

pub mod address;
pub mod payload;
pub mod tracing;

pub use address::{ADDRESS_SEPARATOR, Address, AddressError, DEFAULT_PORT, local_ip};
pub use payload::{
    DEFAULT_REPLY_MARKER, DEFAULT_SCAN_MARKER, DiscoveryMarkers, Payload, PayloadKind,
    now_timestamp,
};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
