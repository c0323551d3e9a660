//! Port traits — the seams between the control plane and the outside world.
//!
//! The dispatch core, config plane and supervisor only ever talk to these
//! traits.  Hardware adapters implement them on the device; the test suites
//! implement them with in-memory fakes.

use crate::error::{ConfigValidationError, NetworkServiceError};
use crate::telemetry::EventFrame;

// ---------------------------------------------------------------------------
// Receiver link
// ---------------------------------------------------------------------------

/// Decoded RC receiver link.  The protocol itself (SBUS, CRSF, ...) lives
/// behind this trait and is out of scope for the control plane.
pub trait ReceiverPort {
    /// Drain the receiver's input and update channel state.
    fn poll(&mut self);

    /// True while frames are arriving and the link reports itself healthy.
    fn is_link_up(&self) -> bool;

    /// Latest raw value for a channel (1-based).  Values may exceed the
    /// nominal range; the dispatcher clamps them.
    fn channel(&self, id: u8) -> u16;
}

// ---------------------------------------------------------------------------
// Output pins
// ---------------------------------------------------------------------------

/// A digital output pin.  `Send` because the blink toggler drives its pin
/// from its own thread.
pub trait DigitalPin: Send {
    fn set_level(&mut self, high: bool);
}

/// A PWM-capable output pin, 8-bit duty.
pub trait PwmPin: Send {
    fn set_duty(&mut self, duty: u8);
}

/// Constructs pin instances at apply time.  Creation is fallible: the
/// hardware backend can refuse a GPIO (already claimed, no LEDC slot free).
pub trait OutputFactory {
    fn digital(&mut self, gpio: u8) -> Result<Box<dyn DigitalPin>, ConfigValidationError>;
    fn pwm(&mut self, gpio: u8) -> Result<Box<dyn PwmPin>, ConfigValidationError>;
}

// ---------------------------------------------------------------------------
// Persistent byte store
// ---------------------------------------------------------------------------

/// A raw persistent byte region (EEPROM-style).  Writes are staged until
/// [`ByteStore::commit`].  Offsets beyond the region begun with
/// [`ByteStore::begin`] are the caller's bug; implementations clamp.
pub trait ByteStore {
    /// Reserve `size` bytes.  Returns false if the backing medium cannot
    /// provide them.
    fn begin(&mut self, size: usize) -> bool;

    fn read_at(&self, offset: usize, buf: &mut [u8]);

    fn write_at(&mut self, offset: usize, data: &[u8]);

    /// Flush staged writes to the medium.
    fn commit(&mut self) -> bool;

    fn capacity(&self) -> usize;
}

// ---------------------------------------------------------------------------
// Network service
// ---------------------------------------------------------------------------

/// Receives outbound event frames (log lines, telemetry snapshots).
pub trait FrameSink {
    fn emit(&mut self, frame: &EventFrame);
}

/// The auxiliary network stack (AP + DNS + HTTP configurator) as one
/// acquire/release resource.  The supervisor creates a fresh instance per
/// running period and drops it on teardown.
pub trait NetworkService: FrameSink {
    /// Bring the whole stack up.  On error nothing is left half-started;
    /// the supervisor logs and retries on a later evaluation.
    fn start(&mut self) -> Result<(), NetworkServiceError>;

    /// Tear down in reverse start order.
    fn stop(&mut self);

    /// Service pending client work.  Called from the supervisor's update.
    fn pump(&mut self);
}

/// Builds [`NetworkService`] instances.  A new instance per running period
/// keeps no stale client or socket state across restarts.
pub trait ServiceFactory {
    fn create(&mut self) -> Box<dyn NetworkService>;
}
