//! Blinking output: an independently scheduled on/off toggle gated by a
//! threshold predicate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::ports::DigitalPin;

use super::{ChannelHandler, Predicate};

/// Toggle scheduling granularity.  The toggler sleeps in slices of this
/// length so a stop request is honoured promptly.
const STOP_POLL: Duration = Duration::from_millis(10);

/// While the predicate holds, a background toggler alternates the pin
/// HIGH for `on_time` and LOW for `off_time`.  Start is idempotent; stop
/// joins the toggler and forces the pin LOW before returning, so no
/// toggle can land after the handler reports the pin off.
pub struct BlinkHandler {
    pin: Arc<Mutex<Box<dyn DigitalPin>>>,
    predicate: Predicate,
    on_time: Duration,
    off_time: Duration,
    toggler: Option<Toggler>,
}

struct Toggler {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl BlinkHandler {
    pub fn new(
        pin: Box<dyn DigitalPin>,
        predicate: Predicate,
        on_time_ms: u32,
        off_time_ms: u32,
    ) -> Self {
        Self {
            pin: Arc::new(Mutex::new(pin)),
            predicate,
            on_time: Duration::from_millis(u64::from(on_time_ms)),
            off_time: Duration::from_millis(u64::from(off_time_ms)),
            toggler: None,
        }
    }

    pub fn is_blinking(&self) -> bool {
        self.toggler.is_some()
    }

    fn start(&mut self) {
        if self.toggler.is_some() {
            return;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let pin = Arc::clone(&self.pin);
        let (on_time, off_time) = (self.on_time, self.off_time);
        let handle = thread::spawn(move || {
            let mut level = true;
            loop {
                if let Ok(mut pin) = pin.lock() {
                    pin.set_level(level);
                }
                let window = if level { on_time } else { off_time };
                let mut slept = Duration::ZERO;
                while slept < window {
                    if flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let slice = STOP_POLL.min(window - slept);
                    thread::sleep(slice);
                    slept += slice;
                }
                level = !level;
            }
        });
        self.toggler = Some(Toggler { stop, handle });
    }

    fn stop(&mut self) {
        if let Some(toggler) = self.toggler.take() {
            toggler.stop.store(true, Ordering::Relaxed);
            let _ = toggler.handle.join();
        }
        // The toggler has exited; this LOW is final.
        if let Ok(mut pin) = self.pin.lock() {
            pin.set_level(false);
        }
    }
}

impl ChannelHandler for BlinkHandler {
    fn on_channel_change(&mut self, value: u16) {
        if self.predicate.eval(value) {
            self.start();
        } else {
            self.stop();
        }
    }
}

impl Drop for BlinkHandler {
    fn drop(&mut self) {
        self.stop();
    }
}
