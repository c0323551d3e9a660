//! Log-based frame sink adapter.
//!
//! Implements [`FrameSink`] by writing outbound frames to the logger
//! (UART / USB-CDC in production).  Useful while the network service is
//! down, and as the default sink in tests.

use log::info;

use crate::ports::FrameSink;
use crate::telemetry::EventFrame;

/// Adapter that logs every [`EventFrame`] to the serial console.
pub struct LogFrameSink;

impl LogFrameSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogFrameSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for LogFrameSink {
    fn emit(&mut self, frame: &EventFrame) {
        match frame {
            EventFrame::Logging(line) => info!("LOG   | {line}"),
            EventFrame::Telemetry(t) => {
                info!(
                    "TELEM | receiving={} error={} | ch1-4: {} {} {} {}",
                    t.is_receiving,
                    t.has_error,
                    t.channels[0],
                    t.channels[1],
                    t.channels[2],
                    t.channels[3],
                );
            }
        }
    }
}
