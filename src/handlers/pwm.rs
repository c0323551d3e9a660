//! Proportional output: linear map from channel range to duty range.

use crate::config::{CHANNEL_MAX, CHANNEL_MIN};
use crate::ports::PwmPin;

use super::ChannelHandler;

/// Maps `[CHANNEL_MIN, CHANNEL_MAX]` onto `[min, max]` duty.  Inversion
/// swaps the source endpoints, so an inverted handler drives `max` at
/// `CHANNEL_MIN` and `min` at `CHANNEL_MAX`.
pub struct PwmHandler {
    pin: Box<dyn PwmPin>,
    min: u8,
    max: u8,
    inverted: bool,
}

impl PwmHandler {
    pub fn new(pin: Box<dyn PwmPin>, min: u8, max: u8) -> Self {
        Self {
            pin,
            min,
            max,
            inverted: false,
        }
    }

    /// Drive the output once with `initial` so the actuator holds a known
    /// position before the first channel value arrives.
    pub fn setup(&mut self, initial: u16) {
        self.write(initial);
    }

    /// Inversion is a runtime property, changeable without re-registering.
    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    fn write(&mut self, value: u16) {
        let duty = linear_map(value, self.min, self.max, self.inverted);
        self.pin.set_duty(duty);
    }
}

impl ChannelHandler for PwmHandler {
    fn on_channel_change(&mut self, value: u16) {
        self.write(value);
    }
}

/// Integer linear interpolation with input clamping.
fn linear_map(value: u16, min: u8, max: u8, inverted: bool) -> u8 {
    let value = i32::from(value.clamp(CHANNEL_MIN, CHANNEL_MAX));
    let (from_lo, from_hi) = if inverted {
        (i32::from(CHANNEL_MAX), i32::from(CHANNEL_MIN))
    } else {
        (i32::from(CHANNEL_MIN), i32::from(CHANNEL_MAX))
    };
    let span_out = i32::from(max) - i32::from(min);
    let out = i32::from(min) + (value - from_lo) * span_out / (from_hi - from_lo);
    out.clamp(i32::from(min), i32::from(max)) as u8
}
