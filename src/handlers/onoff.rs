//! Discrete output: pin follows a threshold predicate.

use crate::ports::DigitalPin;

use super::{ChannelHandler, Predicate};

/// Drives the pin HIGH while the predicate holds, LOW otherwise.  Writing
/// the same level repeatedly is harmless, which makes the failsafe path's
/// every-tick re-assertion idempotent.
pub struct OnOffHandler {
    pin: Box<dyn DigitalPin>,
    predicate: Predicate,
}

impl OnOffHandler {
    pub fn new(pin: Box<dyn DigitalPin>, predicate: Predicate) -> Self {
        Self { pin, predicate }
    }
}

impl ChannelHandler for OnOffHandler {
    fn on_channel_change(&mut self, value: u16) {
        self.pin.set_level(self.predicate.eval(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdOperator;
    use std::sync::{Arc, Mutex};

    struct RecordingPin(Arc<Mutex<Vec<bool>>>);

    impl DigitalPin for RecordingPin {
        fn set_level(&mut self, high: bool) {
            if let Ok(mut log) = self.0.lock() {
                log.push(high);
            }
        }
    }

    #[test]
    fn pin_tracks_predicate() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut h = OnOffHandler::new(
            Box::new(RecordingPin(Arc::clone(&log))),
            Predicate {
                threshold: 1500,
                operator: ThresholdOperator::GreaterThan,
            },
        );
        h.on_channel_change(1600);
        h.on_channel_change(1600);
        h.on_channel_change(1400);
        assert_eq!(log.lock().unwrap().as_slice(), &[true, true, false]);
    }
}
