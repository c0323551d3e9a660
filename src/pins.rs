//! Logical pin map for the vehicle main board.
//!
//! Single source of truth — configuration entries reference pins by logical
//! name, and the web configurator fetches this table to populate its pin
//! picker.  Change a pin here and it propagates everywhere.

use serde::Serialize;

/// One board pin: GPIO number plus whether the LEDC peripheral can drive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinInfo {
    pub pin: u8,
    #[serde(rename = "isPWM")]
    pub is_pwm: bool,
}

/// ESP32-C3 SuperMini pin mapping.
pub const PIN_MAP: &[(&str, PinInfo)] = &[
    ("STEERING", PinInfo { pin: 6, is_pwm: true }),
    ("THROTTLE", PinInfo { pin: 5, is_pwm: true }),
    ("HEADLIGHT", PinInfo { pin: 9, is_pwm: true }),
    ("BLINKER_LEFT", PinInfo { pin: 10, is_pwm: true }),
    ("BLINKER_RIGHT", PinInfo { pin: 20, is_pwm: true }),
    ("BRAKE_LIGHT", PinInfo { pin: 21, is_pwm: true }),
    ("WINCH_1", PinInfo { pin: 7, is_pwm: true }),
    ("WINCH_2", PinInfo { pin: 8, is_pwm: true }),
];

/// Resolve a logical pin name.
pub fn resolve(name: &str) -> Option<PinInfo> {
    PIN_MAP
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, info)| *info)
}

/// JSON export for `GET /api/pins`: `{"STEERING":{"pin":6,"isPWM":true},...}`.
pub fn pin_map_json() -> String {
    let entries: Vec<String> = PIN_MAP
        .iter()
        .filter_map(|(name, info)| {
            serde_json::to_string(info)
                .ok()
                .map(|body| format!("\"{name}\":{body}"))
        })
        .collect();
    format!("{{{}}}", entries.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve() {
        let steering = resolve("STEERING").unwrap();
        assert_eq!(steering.pin, 6);
        assert!(steering.is_pwm);
        assert!(resolve("DOES_NOT_EXIST").is_none());
    }

    #[test]
    fn gpio_numbers_are_unique() {
        for (i, (_, a)) in PIN_MAP.iter().enumerate() {
            for (_, b) in &PIN_MAP[i + 1..] {
                assert_ne!(a.pin, b.pin);
            }
        }
    }

    #[test]
    fn export_is_valid_json() {
        let json = pin_map_json();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["STEERING"]["pin"], 6);
        assert_eq!(doc["STEERING"]["isPWM"], true);
        assert_eq!(doc.as_object().unwrap().len(), PIN_MAP.len());
    }
}
