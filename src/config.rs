//! Configuration model and wire format.
//!
//! One canonical JSON form is used everywhere: it is what the web UI posts,
//! what the API serves back, and what the [`crate::store`] persists.  Parsing
//! is deliberately lossy — unknown or malformed optional fields fall back to
//! their defaults, and oversized handler lists are truncated, never rejected.
//! A request that fails JSON parsing entirely yields the default `Config`.

use heapless::{String as HString, Vec as HVec};
use log::warn;
use serde::{Serialize, Serializer};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Channel constants
// ---------------------------------------------------------------------------

/// Lowest valid channel value (microseconds of RC pulse width).
pub const CHANNEL_MIN: u16 = 1000;
/// Highest valid channel value.
pub const CHANNEL_MAX: u16 = 2000;
/// Neutral stick position.
pub const CHANNEL_MID: u16 = 1500;
/// Channels are numbered 1..=16.
pub const CHANNEL_COUNT: usize = 16;
/// Maximum bindings a single channel can carry.
pub const MAX_HANDLERS_PER_CHANNEL: usize = 10;
/// Maximum handler entries a configuration can carry.
pub const MAX_HANDLERS: usize = 20;

// ---------------------------------------------------------------------------
// Handler kind and threshold operator
// ---------------------------------------------------------------------------

/// Output handler family.  `Unknown` absorbs unrecognised `type` strings at
/// parse time so apply() can log-and-skip the entry instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Pwm,
    OnOff,
    Blink,
    Unknown,
}

impl HandlerKind {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "pwm" => Self::Pwm,
            "onoff" => Self::OnOff,
            "blink" => Self::Blink,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Pwm => "pwm",
            Self::OnOff => "onoff",
            Self::Blink => "blink",
            Self::Unknown => "unknown",
        }
    }
}

impl Serialize for HandlerKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

/// Comparison applied to a channel value to decide whether an OnOff or Blink
/// handler is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOperator {
    LessThan,
    GreaterThan,
    Equals,
}

impl ThresholdOperator {
    /// Unknown operator strings collapse to `GreaterThan` with a warning.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "lessThan" => Self::LessThan,
            "greaterThan" => Self::GreaterThan,
            "equals" => Self::Equals,
            other => {
                warn!("unknown operator '{other}', defaulting to greaterThan");
                Self::GreaterThan
            }
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::LessThan => "lessThan",
            Self::GreaterThan => "greaterThan",
            Self::Equals => "equals",
        }
    }

    /// Evaluate `value` against `threshold`.
    pub fn eval(self, value: u16, threshold: u16) -> bool {
        match self {
            Self::LessThan => value < threshold,
            Self::GreaterThan => value > threshold,
            Self::Equals => value == threshold,
        }
    }
}

impl Serialize for ThresholdOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

// ---------------------------------------------------------------------------
// Handler entry
// ---------------------------------------------------------------------------

/// One persisted handler descriptor.  Field names follow the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerConfig {
    #[serde(rename = "type")]
    pub kind: HandlerKind,
    /// Logical pin name, resolved against the board pin map at apply time.
    pub pin: HString<16>,
    pub channel: u8,
    /// Value driven while the link is unhealthy.  Absent means "use the
    /// channel mid-point".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failsafe: Option<u16>,
    pub threshold: u16,
    pub operator: ThresholdOperator,
    pub inverted: bool,
    pub min: u8,
    pub max: u8,
    pub on_time: u32,
    pub off_time: u32,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            kind: HandlerKind::Unknown,
            pin: HString::new(),
            channel: 0,
            failsafe: None,
            threshold: CHANNEL_MID,
            operator: ThresholdOperator::GreaterThan,
            inverted: false,
            min: 0,
            max: 255,
            on_time: 300,
            off_time: 400,
        }
    }
}

impl HandlerConfig {
    /// Build an entry from one JSON object, defaulting every absent or
    /// malformed optional field.
    fn from_value_lossy(v: &Value) -> Self {
        let mut entry = Self::default();
        if let Some(s) = v.get("type").and_then(Value::as_str) {
            entry.kind = HandlerKind::from_wire(s);
        }
        if let Some(s) = v.get("pin").and_then(Value::as_str) {
            entry.pin = bounded(s);
        }
        entry.channel = u64_field(v, "channel", 0) as u8;
        entry.failsafe = v
            .get("failsafe")
            .and_then(Value::as_u64)
            .map(|n| n.min(u64::from(u16::MAX)) as u16);
        entry.threshold = u64_field(v, "threshold", u64::from(CHANNEL_MID)) as u16;
        if let Some(s) = v.get("operator").and_then(Value::as_str) {
            entry.operator = ThresholdOperator::from_wire(s);
        }
        entry.inverted = v.get("inverted").and_then(Value::as_bool).unwrap_or(false);
        entry.min = u64_field(v, "min", 0) as u8;
        entry.max = u64_field(v, "max", 255) as u8;
        entry.on_time = u64_field(v, "onTime", 300) as u32;
        entry.off_time = u64_field(v, "offTime", 400) as u32;
        entry
    }
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

/// Complete board configuration, in canonical wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub handlers: HVec<HandlerConfig, MAX_HANDLERS>,
    pub ap_ssid: HString<32>,
    pub ap_password: HString<32>,
    pub keep_web_server_running: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            handlers: HVec::new(),
            ap_ssid: bounded("Bordcomputer"),
            ap_password: bounded("bordcomputer"),
            keep_web_server_running: false,
        }
    }
}

impl Config {
    /// Parse the wire JSON, tolerating missing fields, oversized handler
    /// lists (truncated to [`MAX_HANDLERS`]) and unknown handler types.
    /// Input that is not parseable JSON at all yields the defaults.
    pub fn from_json_lossy(json: &str) -> Self {
        let doc: Value = match serde_json::from_str(json) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("config JSON unparsable ({e}), using defaults");
                return Self::default();
            }
        };

        let mut config = Self::default();
        if let Some(entries) = doc.get("handlers").and_then(Value::as_array) {
            if entries.len() > MAX_HANDLERS {
                warn!(
                    "config carries {} handlers, truncating to {MAX_HANDLERS}",
                    entries.len()
                );
            }
            for entry in entries.iter().take(MAX_HANDLERS) {
                let _ = config.handlers.push(HandlerConfig::from_value_lossy(entry));
            }
        }
        if let Some(s) = doc.get("apSsid").and_then(Value::as_str) {
            config.ap_ssid = bounded(s);
        }
        if let Some(s) = doc.get("apPassword").and_then(Value::as_str) {
            config.ap_password = bounded(s);
        }
        if let Some(b) = doc.get("keepWebServerRunning").and_then(Value::as_bool) {
            config.keep_web_server_running = b;
        }
        config
    }

    /// Canonical JSON form, persisted and served over the API alike.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(s) => s,
            Err(e) => {
                warn!("config serialisation failed: {e}");
                String::new()
            }
        }
    }

    /// Default wiring profile for a blank board: steering and throttle
    /// servos, headlight, steering-coupled blinkers, brake light and both
    /// winches.  Lets a freshly flashed vehicle drive before the user ever
    /// opens the configurator.
    pub fn factory() -> Self {
        const QUARTER: u16 = (CHANNEL_MAX - CHANNEL_MIN) / 4;
        let mut config = Self::default();
        let entries = [
            HandlerConfig {
                kind: HandlerKind::Pwm,
                pin: bounded("STEERING"),
                channel: 1,
                failsafe: Some(CHANNEL_MID),
                min: 0,
                max: 180,
                ..HandlerConfig::default()
            },
            HandlerConfig {
                kind: HandlerKind::Pwm,
                pin: bounded("THROTTLE"),
                channel: 2,
                failsafe: Some(CHANNEL_MID),
                min: 0,
                max: 180,
                ..HandlerConfig::default()
            },
            HandlerConfig {
                kind: HandlerKind::OnOff,
                pin: bounded("HEADLIGHT"),
                channel: 3,
                failsafe: Some(CHANNEL_MIN),
                threshold: CHANNEL_MID,
                operator: ThresholdOperator::GreaterThan,
                ..HandlerConfig::default()
            },
            // Blinkers ride on the steering channel: left below the lower
            // quarter, right above the upper quarter.
            HandlerConfig {
                kind: HandlerKind::Blink,
                pin: bounded("BLINKER_LEFT"),
                channel: 1,
                failsafe: Some(CHANNEL_MIN),
                threshold: CHANNEL_MIN + QUARTER,
                operator: ThresholdOperator::LessThan,
                ..HandlerConfig::default()
            },
            HandlerConfig {
                kind: HandlerKind::Blink,
                pin: bounded("BLINKER_RIGHT"),
                channel: 1,
                failsafe: Some(CHANNEL_MIN),
                threshold: CHANNEL_MAX - QUARTER,
                operator: ThresholdOperator::GreaterThan,
                ..HandlerConfig::default()
            },
            HandlerConfig {
                kind: HandlerKind::OnOff,
                pin: bounded("BRAKE_LIGHT"),
                channel: 2,
                failsafe: Some(CHANNEL_MIN),
                threshold: CHANNEL_MID,
                operator: ThresholdOperator::LessThan,
                ..HandlerConfig::default()
            },
            HandlerConfig {
                kind: HandlerKind::Pwm,
                pin: bounded("WINCH_1"),
                channel: 6,
                failsafe: Some(CHANNEL_MID),
                min: 0,
                max: 180,
                ..HandlerConfig::default()
            },
            HandlerConfig {
                kind: HandlerKind::Pwm,
                pin: bounded("WINCH_2"),
                channel: 7,
                failsafe: Some(CHANNEL_MID),
                min: 0,
                max: 180,
                ..HandlerConfig::default()
            },
        ];
        for entry in entries {
            let _ = config.handlers.push(entry);
        }
        config
    }
}

/// Copy a str into a fixed-capacity string, truncating at capacity.
pub(crate) fn bounded<const N: usize>(s: &str) -> HString<N> {
    let mut out = HString::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

fn u64_field(v: &Value, key: &str, default: u64) -> u64 {
    v.get(key).and_then(Value::as_u64).unwrap_or(default)
}
