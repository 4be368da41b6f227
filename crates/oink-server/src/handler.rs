//! Response policy for inbound requests.
//!
//! JSON requests are routed on their `action` field: `search` looks the value
//! up in a fixed answer table, `message` is acknowledged, anything else gets
//! an error result. Opaque requests are echoed back truncated.

use serde_json::Value;
use tracing::{debug, warn};

use oink_core::Payload;
use oink_protocol::{Body, Frame, ProtocolResult, Response, SERVER_BINARY_CONTENT_TYPE};

/// Fixed answers for `search` requests.
pub const SEARCH_TABLE: [(&str, &str); 3] = [
    ("morpheus", "Follow the white rabbit. \u{1f430}"),
    ("ring", "In the caves beneath the Misty Mountains. \u{1f48d}"),
    ("\u{1f436}", "\u{1f43e} Playing ball! \u{1f3d0}"),
];

/// Prefix of the echo sent back for opaque requests.
pub const BINARY_ECHO_PREFIX: &[u8] = b"First 10 bytes of request: ";

const BINARY_ECHO_LEN: usize = 10;

/// Looks a query up in [`SEARCH_TABLE`].
pub fn lookup(query: &str) -> Option<&'static str> {
    SEARCH_TABLE
        .iter()
        .find(|(key, _)| *key == query)
        .map(|(_, answer)| *answer)
}

/// Builds the response frame for a decoded request body.
pub fn respond(body: &Body) -> ProtocolResult<Frame> {
    match body {
        Body::Json(request) => Frame::json(&response_for(request)),
        Body::Binary(content) => {
            let take = content.len().min(BINARY_ECHO_LEN);
            let mut echo = BINARY_ECHO_PREFIX.to_vec();
            echo.extend_from_slice(&content[..take]);
            Ok(Frame::binary(SERVER_BINARY_CONTENT_TYPE, echo))
        }
    }
}

/// Chooses the result text for a JSON request.
pub fn response_for(request: &Value) -> Response {
    let action = request.get("action").unwrap_or(&Value::Null);
    let value = request.get("value").unwrap_or(&Value::Null);
    match action.as_str() {
        Some("search") => {
            let query = display_value(value);
            match lookup(&query) {
                Some(answer) => Response::new(answer),
                None => Response::no_match(&query),
            }
        }
        Some("message") => Response::acknowledged(),
        _ => Response::invalid_action(&display_value(action)),
    }
}

/// Extracts the payload carried by a `message` request.
///
/// A malformed payload is logged and dropped; the request is still
/// acknowledged.
pub fn inbound_payload(body: &Body) -> Option<Payload> {
    let Body::Json(request) = body else {
        return None;
    };
    if request.get("action").and_then(Value::as_str) != Some("message") {
        return None;
    }
    let value = request.get("value").cloned().unwrap_or(Value::Null);
    match serde_json::from_value::<Payload>(value) {
        Ok(payload) => {
            debug!(from = %payload.from, "message payload received");
            Some(payload)
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed message payload");
            None
        }
    }
}

// Strings print bare, everything else as JSON text.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
