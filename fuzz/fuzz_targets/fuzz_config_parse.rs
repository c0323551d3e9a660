//! Fuzz target: `Config::from_json_lossy`
//!
//! Drives arbitrary byte sequences through the lossy wire-format parser
//! and asserts that it never panics, never exceeds the handler capacity,
//! and that its output survives a serialize/parse round trip.
//!
//! cargo fuzz run fuzz_config_parse

#![no_main]

use bordcomputer::config::{Config, MAX_HANDLERS};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    let config = Config::from_json_lossy(text);
    assert!(config.handlers.len() <= MAX_HANDLERS);

    // The canonical form must be stable under one more round trip.
    let json = config.to_json();
    let reparsed = Config::from_json_lossy(&json);
    assert_eq!(config, reparsed);
});
