//! Status indicator drivers.

pub mod led_patterns;
pub mod status_led;
