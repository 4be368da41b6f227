//! Request and response bodies carried in `text/json` frames.

use oink_core::Payload;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolResult;
use crate::framing::Frame;

/// Content type of opaque client requests.
pub const CLIENT_BINARY_CONTENT_TYPE: &str = "binary/custom-client-binary-type";

/// Content type of the server's echo response to opaque requests.
pub const SERVER_BINARY_CONTENT_TYPE: &str = "binary/custom-server-binary-type";

/// Result text acknowledging a delivered message.
pub const ACKNOWLEDGED: &str = "ACKNOWLEDGED AND RECEIVED";

/// A client request, serialized as `{"action": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum Request {
    /// Deliver a payload to the receiver's inbox.
    Message(Payload),
    /// Look a word up in the server's answer table.
    Search(String),
}

impl Request {
    /// Creates a message request.
    pub fn message(payload: Payload) -> Self {
        Self::Message(payload)
    }

    /// Creates a search request.
    pub fn search(query: impl Into<String>) -> Self {
        Self::Search(query.into())
    }

    /// Action name as it appears on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Search(_) => "search",
        }
    }

    /// Wraps the request in a `text/json` frame.
    pub fn to_frame(&self) -> ProtocolResult<Frame> {
        Frame::json(self)
    }
}

/// The server's answer, serialized as `{"result": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub result: String,
}

impl Response {
    /// Creates a response with the given result text.
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }

    /// Acknowledges a `message` request.
    pub fn acknowledged() -> Self {
        Self::new(ACKNOWLEDGED)
    }

    /// Answers a `search` without a table entry.
    pub fn no_match(query: &str) -> Self {
        Self::new(format!("No match for '{query}'."))
    }

    /// Answers an unrecognized action.
    pub fn invalid_action(action: &str) -> Self {
        Self::new(format!("Error: invalid action '{action}'."))
    }

    /// Whether this acknowledges a delivered message.
    pub fn is_acknowledged(&self) -> bool {
        self.result == ACKNOWLEDGED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oink_core::Address;

    fn payload() -> Payload {
        Payload {
            to: Address::new("127.0.0.1", 49001),
            from: Address::new("127.0.0.1", 49000),
            timestamp: 12.5,
            text: "oink".into(),
            nickname: Some("hamlet".into()),
        }
    }

    #[test]
    fn message_request_shape() {
        insta::assert_json_snapshot!(Request::message(payload()), @r###"
        {
          "action": "message",
          "value": {
            "to": [
              "127.0.0.1",
              49001
            ],
            "from": [
              "127.0.0.1",
              49000
            ],
            "timestamp": 12.5,
            "text": "oink",
            "nickname": "hamlet"
          }
        }
        "###);
    }

    #[test]
    fn search_request_roundtrip() {
        let request = Request::search("ring");
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"action":"search","value":"ring"}"#);
        assert_eq!(serde_json::from_str::<Request>(&json).unwrap(), request);
        assert_eq!(request.action(), "search");
    }

    #[test]
    fn request_frame_is_json() {
        let frame = Request::message(payload()).to_frame().unwrap();
        assert!(frame.header.is_json());
        let back: Request = frame.json_body().unwrap();
        assert_eq!(back, Request::message(payload()));
    }

    #[test]
    fn response_texts() {
        assert!(Response::acknowledged().is_acknowledged());
        assert_eq!(
            Response::no_match("gandalf").result,
            "No match for 'gandalf'."
        );
        assert_eq!(
            Response::invalid_action("xyz").result,
            "Error: invalid action 'xyz'."
        );
    }
}
