//! Outbound event frames.
//!
//! Everything the board pushes to connected clients travels as one tagged
//! frame type: log lines and telemetry snapshots.  The JSON shape is
//! `{"type":"LOGGING"|"TELEMETRY","data":...}`.

use std::time::Instant;

use serde::Serialize;

use crate::config::CHANNEL_COUNT;
use crate::dispatch::ChannelDispatcher;

/// Link and channel state snapshot, broadcast at ~10 Hz while the network
/// service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub is_receiving: bool,
    pub has_error: bool,
    pub channels: [u16; CHANNEL_COUNT],
}

impl TelemetrySnapshot {
    pub fn capture(dispatcher: &ChannelDispatcher, now: Instant) -> Self {
        let mut channels = [0u16; CHANNEL_COUNT];
        for (i, slot) in channels.iter_mut().enumerate() {
            *slot = dispatcher.channel_value((i + 1) as u8);
        }
        Self {
            is_receiving: dispatcher.is_receiving(now),
            has_error: dispatcher.has_error(now),
            channels,
        }
    }
}

/// One outbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum EventFrame {
    #[serde(rename = "LOGGING")]
    Logging(String),
    #[serde(rename = "TELEMETRY")]
    Telemetry(TelemetrySnapshot),
}

impl EventFrame {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
