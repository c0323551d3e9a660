//! Status indicator pattern engine.
//!
//! Generates a time-varying brightness for the status LED from the link
//! state.  The main loop calls `tick()` each control cycle and feeds the
//! result into `StatusLed::set_brightness()`.
//!
//! | State        | Pattern                          |
//! |--------------|----------------------------------|
//! | Unconfigured | Slow blink, 500 ms on / 500 off  |
//! | LinkUp       | Breathing fade, 2 s period       |
//! | LinkDown     | Fast blink, 150 ms on / 150 off  |
//! | Error        | Double blink, then a long pause  |

use crate::dispatch::LinkStatus;

/// Stack-allocated, no heap.
pub struct StatusPatternEngine {
    phase_ms: u32,
    status: LinkStatus,
}

impl StatusPatternEngine {
    pub fn new() -> Self {
        Self {
            phase_ms: 0,
            status: LinkStatus::Unconfigured,
        }
    }

    /// Switching state restarts the pattern phase so the first flash of the
    /// new pattern is not swallowed.
    pub fn set_status(&mut self, status: LinkStatus) {
        if status != self.status {
            self.status = status;
            self.phase_ms = 0;
        }
    }

    /// Advance the phase and return the current brightness (0-255).
    /// `delta_ms` is the time since the last call.
    pub fn tick(&mut self, delta_ms: u32) -> u8 {
        let out = self.generate();
        self.phase_ms = self.phase_ms.wrapping_add(delta_ms);
        out
    }

    fn generate(&self) -> u8 {
        match self.status {
            LinkStatus::Unconfigured => {
                if self.phase_ms % 1000 < 500 { 255 } else { 0 }
            }
            LinkStatus::LinkUp => Self::triangle(self.phase_ms, 2000),
            LinkStatus::LinkDown => {
                if self.phase_ms % 300 < 150 { 255 } else { 0 }
            }
            LinkStatus::Error => {
                // 100 on, 100 off, 100 on, 500 pause.
                let cycle = self.phase_ms % 800;
                if cycle < 100 || (200..300).contains(&cycle) {
                    255
                } else {
                    0
                }
            }
        }
    }

    /// Sine-ish brightness without libm: ramps 0 -> 255 -> 0 over `period_ms`.
    fn triangle(phase_ms: u32, period_ms: u32) -> u8 {
        let pos = u64::from(phase_ms % period_ms);
        let half = u64::from(period_ms) / 2;
        if pos < half {
            ((pos * 255) / half) as u8
        } else {
            (((u64::from(period_ms) - pos) * 255) / half) as u8
        }
    }
}

impl Default for StatusPatternEngine {
    fn default() -> Self {
        Self::new()
    }
}
