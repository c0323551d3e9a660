//! Output handler state machines.
//!
//! A handler consumes channel values and drives exactly one output pin.
//! The dispatcher owns handlers as boxed trait objects and invokes them on
//! value changes and on every failsafe tick.

mod blink;
mod onoff;
mod pwm;

pub use blink::BlinkHandler;
pub use onoff::OnOffHandler;
pub use pwm::PwmHandler;

use crate::config::ThresholdOperator;

/// A bound output handler.  `Send` because cleanup may drop handlers whose
/// internals (the blink toggler) span threads.
pub trait ChannelHandler: Send {
    /// Called with the clamped channel value on change, and with the
    /// failsafe value on every tick while the link is unhealthy.
    fn on_channel_change(&mut self, value: u16);
}

/// Threshold predicate shared by the OnOff and Blink handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predicate {
    pub threshold: u16,
    pub operator: ThresholdOperator,
}

impl Predicate {
    pub fn eval(&self, value: u16) -> bool {
        self.operator.eval(value, self.threshold)
    }
}
