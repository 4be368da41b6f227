//! Subcommand implementations.

pub mod config;
pub mod listen;
pub mod scan;
pub mod send;

use chrono::{DateTime, Local};

use oink_core::PayloadKind;

use crate::node::Inbound;

/// Renders a received payload as one line.
pub fn render_inbound(inbound: &Inbound) -> String {
    let payload = &inbound.payload;
    let when = DateTime::from_timestamp_millis((payload.timestamp * 1000.0) as i64)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    let nickname = payload.nickname.as_deref().unwrap_or("?");
    match inbound.kind {
        PayloadKind::Message => format!("[{when}] {}: {}", payload.from, payload.text),
        PayloadKind::Scan => format!("[{when}] scan from {nickname} ({})", payload.from),
        PayloadKind::Reply => format!("[{when}] {nickname} is at {}", payload.from),
    }
}
