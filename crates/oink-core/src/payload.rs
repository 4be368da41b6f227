//! Application payloads and discovery markers.
//!
//! A [`Payload`] is what one peer sends another. The networking layer treats
//! it as opaque except for the `text` field, which it compares against the two
//! reserved [`DiscoveryMarkers`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Default text of a discovery scan.
pub const DEFAULT_SCAN_MARKER: &str = "__oink_scan__";

/// Default text of a discovery reply.
pub const DEFAULT_REPLY_MARKER: &str = "__oink_reply__";

/// A message exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Destination address.
    pub to: Address,
    /// Sender's listening address.
    pub from: Address,
    /// Seconds since the Unix epoch, fractional.
    pub timestamp: f64,
    /// Message text or a discovery marker.
    pub text: String,
    /// Sender's nickname, set on discovery payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl Payload {
    /// Creates a payload stamped with the current time.
    pub fn new(to: Address, from: Address, text: impl Into<String>) -> Self {
        Self {
            to,
            from,
            timestamp: now_timestamp(),
            text: text.into(),
            nickname: None,
        }
    }

    /// Attaches the sender's nickname.
    #[must_use]
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }
}

/// Current time as fractional Unix seconds.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// How an inbound payload should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Ordinary user message.
    Message,
    /// Discovery scan; the receiver answers with a reply.
    Scan,
    /// Discovery reply; never answered.
    Reply,
}

/// The two reserved texts used for peer discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryMarkers {
    /// Text carried by scan payloads.
    pub scan: String,
    /// Text carried by reply payloads.
    pub reply: String,
}

impl Default for DiscoveryMarkers {
    fn default() -> Self {
        Self {
            scan: DEFAULT_SCAN_MARKER.to_string(),
            reply: DEFAULT_REPLY_MARKER.to_string(),
        }
    }
}

impl DiscoveryMarkers {
    /// Classifies a payload by its text.
    pub fn classify(&self, payload: &Payload) -> PayloadKind {
        if payload.text == self.scan {
            PayloadKind::Scan
        } else if payload.text == self.reply {
            PayloadKind::Reply
        } else {
            PayloadKind::Message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str) -> Payload {
        Payload {
            to: Address::new("127.0.0.1", 49001),
            from: Address::new("127.0.0.1", 49000),
            timestamp: 1_700_000_000.5,
            text: text.to_string(),
            nickname: None,
        }
    }

    #[test]
    fn wire_shape() {
        let json = serde_json::to_value(sample("hi")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "to": ["127.0.0.1", 49001],
                "from": ["127.0.0.1", 49000],
                "timestamp": 1_700_000_000.5,
                "text": "hi",
            })
        );
    }

    #[test]
    fn nickname_is_optional_on_input() {
        let payload: Payload = serde_json::from_str(
            r#"{"to":["a",1],"from":["b",2],"timestamp":3,"text":"x","nickname":"gus"}"#,
        )
        .unwrap();
        assert_eq!(payload.nickname.as_deref(), Some("gus"));
        assert_eq!(payload.timestamp, 3.0);
    }

    #[test]
    fn classify_markers() {
        let markers = DiscoveryMarkers::default();
        assert_eq!(markers.classify(&sample("hello")), PayloadKind::Message);
        assert_eq!(
            markers.classify(&sample(DEFAULT_SCAN_MARKER)),
            PayloadKind::Scan
        );
        assert_eq!(
            markers.classify(&sample(DEFAULT_REPLY_MARKER)),
            PayloadKind::Reply
        );
    }

    #[test]
    fn new_payload_is_timestamped() {
        let payload = Payload::new(Address::localhost(1), Address::localhost(2), "x")
            .with_nickname("babe");
        assert!(payload.timestamp > 1_600_000_000.0);
        assert_eq!(payload.nickname.as_deref(), Some("babe"));
    }
}
