//! Channel dispatch and failsafe engine.
//!
//! The real-time heart of the system.  A fixed-rate tick polls the receiver,
//! clamps and change-detects channel values, and notifies bound handlers in
//! registration order.  While the link is down or stale every binding is
//! driven with its failsafe value on every tick, so a handler that was
//! re-wired or missed an edge still converges to a safe output.

use std::time::{Duration, Instant};

use heapless::Vec as HVec;
use log::{debug, warn};

use crate::config::{CHANNEL_COUNT, CHANNEL_MAX, CHANNEL_MID, CHANNEL_MIN, MAX_HANDLERS_PER_CHANNEL};
use crate::error::DispatchError;
use crate::handlers::ChannelHandler;
use crate::ports::ReceiverPort;

/// Default staleness window: the link counts as receiving while the last
/// healthy poll is younger than this.
pub const SIGNAL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Coarse link state for the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// No configuration has been applied yet.
    Unconfigured,
    /// Receiving and no fault latched.
    LinkUp,
    /// Link down or stale; failsafe active.
    LinkDown,
    /// A fault was latched by a subsystem.
    Error,
}

struct Binding {
    handler: Box<dyn ChannelHandler>,
    failsafe: u16,
}

struct ChannelSlot {
    /// Last value driven on this channel: the dispatched receiver value,
    /// or the active failsafe while the link is down.
    last_value: Option<u16>,
    /// Set while failsafe is active so recovery re-notifies even when the
    /// incoming value matches `last_value`.
    renotify: bool,
    bindings: HVec<Binding, MAX_HANDLERS_PER_CHANNEL>,
}

impl ChannelSlot {
    const fn new() -> Self {
        Self {
            last_value: None,
            renotify: false,
            bindings: HVec::new(),
        }
    }
}

pub struct ChannelDispatcher {
    channels: [ChannelSlot; CHANNEL_COUNT],
    signal_timeout: Duration,
    link_up: bool,
    last_valid_signal: Option<Instant>,
    configured: bool,
    error_flag: bool,
}

impl Default for ChannelDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelDispatcher {
    pub fn new() -> Self {
        Self::with_signal_timeout(SIGNAL_TIMEOUT)
    }

    pub fn with_signal_timeout(signal_timeout: Duration) -> Self {
        Self {
            channels: core::array::from_fn(|_| ChannelSlot::new()),
            signal_timeout,
            link_up: false,
            last_valid_signal: None,
            configured: false,
            error_flag: false,
        }
    }

    /// Bind a handler to a channel.  `failsafe` of `None` means "drive the
    /// channel mid-point while unhealthy".  Registration order is the
    /// notification order.
    pub fn register(
        &mut self,
        channel: u8,
        handler: Box<dyn ChannelHandler>,
        failsafe: Option<u16>,
    ) -> Result<(), DispatchError> {
        let slot = self
            .slot_mut(channel)
            .ok_or(DispatchError::ChannelOutOfRange(channel))?;
        let binding = Binding {
            handler,
            failsafe: failsafe.unwrap_or(CHANNEL_MID),
        };
        slot.bindings
            .push(binding)
            .map_err(|_| DispatchError::HandlerCapacityExceeded(channel))?;
        debug!("registered handler on channel {channel}");
        Ok(())
    }

    /// One dispatch cycle.  `now` must come from a monotonic clock.
    pub fn tick(&mut self, now: Instant, rx: &mut dyn ReceiverPort) {
        rx.poll();
        self.link_up = rx.is_link_up();
        if self.link_up {
            self.last_valid_signal = Some(now);
        }

        if self.is_receiving(now) {
            for (index, slot) in self.channels.iter_mut().enumerate() {
                let raw = rx.channel((index + 1) as u8);
                let value = raw.clamp(CHANNEL_MIN, CHANNEL_MAX);
                if slot.renotify || slot.last_value != Some(value) {
                    slot.renotify = false;
                    slot.last_value = Some(value);
                    for binding in &mut slot.bindings {
                        binding.handler.on_channel_change(value);
                    }
                }
            }
        } else {
            // Edge-insensitive: failsafe is re-asserted on every tick, not
            // applied once on the down transition.
            for slot in &mut self.channels {
                slot.renotify = true;
                slot.last_value = slot.bindings.first().map(|b| b.failsafe);
                for binding in &mut slot.bindings {
                    binding.handler.on_channel_change(binding.failsafe);
                }
            }
        }
    }

    /// True while the link is up and the last healthy poll is within the
    /// staleness window.
    pub fn is_receiving(&self, now: Instant) -> bool {
        self.link_up
            && self
                .last_valid_signal
                .is_some_and(|t| now.duration_since(t) < self.signal_timeout)
    }

    /// True when not receiving, when a fault is latched, or before the
    /// first configuration was applied.
    pub fn has_error(&self, now: Instant) -> bool {
        !self.is_receiving(now) || self.error_flag || !self.configured
    }

    pub fn status(&self, now: Instant) -> LinkStatus {
        if !self.configured {
            LinkStatus::Unconfigured
        } else if self.error_flag {
            LinkStatus::Error
        } else if !self.is_receiving(now) {
            LinkStatus::LinkDown
        } else {
            LinkStatus::LinkUp
        }
    }

    /// Last value driven on a channel, 0 before any dispatch.  While the
    /// link is down this is the failsafe of the channel's first binding,
    /// so telemetry reports what the outputs are actually being held at.
    pub fn channel_value(&self, channel: u8) -> u16 {
        self.slot(channel)
            .and_then(|s| s.last_value)
            .unwrap_or(0)
    }

    pub fn binding_count(&self, channel: u8) -> usize {
        self.slot(channel).map_or(0, |s| s.bindings.len())
    }

    /// Called by the config plane once a configuration has been wired.
    pub fn mark_configured(&mut self) {
        self.configured = true;
    }

    pub fn set_error(&mut self) {
        warn!("dispatcher fault latched");
        self.error_flag = true;
    }

    pub fn clear_error(&mut self) {
        self.error_flag = false;
    }

    /// Drop every binding.  Handler destructors run here, which stops any
    /// blink togglers before their pins are reused.
    pub fn cleanup(&mut self) {
        for slot in &mut self.channels {
            slot.bindings.clear();
            slot.last_value = None;
            slot.renotify = false;
        }
        self.configured = false;
    }

    fn slot(&self, channel: u8) -> Option<&ChannelSlot> {
        if (1..=CHANNEL_COUNT as u8).contains(&channel) {
            Some(&self.channels[usize::from(channel) - 1])
        } else {
            None
        }
    }

    fn slot_mut(&mut self, channel: u8) -> Option<&mut ChannelSlot> {
        if (1..=CHANNEL_COUNT as u8).contains(&channel) {
            Some(&mut self.channels[usize::from(channel) - 1])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FakeReceiver {
        link_up: bool,
        values: [u16; CHANNEL_COUNT],
    }

    impl FakeReceiver {
        fn new() -> Self {
            Self {
                link_up: true,
                values: [CHANNEL_MID; CHANNEL_COUNT],
            }
        }
    }

    impl ReceiverPort for FakeReceiver {
        fn poll(&mut self) {}

        fn is_link_up(&self) -> bool {
            self.link_up
        }

        fn channel(&self, id: u8) -> u16 {
            self.values[usize::from(id) - 1]
        }
    }

    struct Recorder {
        tag: u8,
        log: Arc<Mutex<Vec<(u8, u16)>>>,
    }

    impl ChannelHandler for Recorder {
        fn on_channel_change(&mut self, value: u16) {
            if let Ok(mut log) = self.log.lock() {
                log.push((self.tag, value));
            }
        }
    }

    fn recorder(tag: u8, log: &Arc<Mutex<Vec<(u8, u16)>>>) -> Box<dyn ChannelHandler> {
        Box::new(Recorder {
            tag,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn register_rejects_out_of_range_channels() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        assert_eq!(
            d.register(0, recorder(0, &log), None),
            Err(DispatchError::ChannelOutOfRange(0))
        );
        assert_eq!(
            d.register(17, recorder(0, &log), None),
            Err(DispatchError::ChannelOutOfRange(17))
        );
        assert!(d.register(1, recorder(0, &log), None).is_ok());
        assert!(d.register(16, recorder(0, &log), None).is_ok());
    }

    #[test]
    fn register_enforces_per_channel_capacity() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        for i in 0..MAX_HANDLERS_PER_CHANNEL {
            assert!(d.register(4, recorder(i as u8, &log), None).is_ok());
        }
        assert_eq!(
            d.register(4, recorder(99, &log), None),
            Err(DispatchError::HandlerCapacityExceeded(4))
        );
        assert_eq!(d.binding_count(4), MAX_HANDLERS_PER_CHANNEL);
    }

    #[test]
    fn change_detection_notifies_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        d.register(2, recorder(1, &log), None).unwrap();
        d.register(2, recorder(2, &log), None).unwrap();
        let mut rx = FakeReceiver::new();
        rx.values[1] = 1700;
        let t0 = Instant::now();
        d.tick(t0, &mut rx);
        // Same value again: no second notification.
        d.tick(t0 + Duration::from_millis(20), &mut rx);
        rx.values[1] = 1800;
        d.tick(t0 + Duration::from_millis(40), &mut rx);
        let writes = log.lock().unwrap().clone();
        assert_eq!(writes, vec![(1, 1700), (2, 1700), (1, 1800), (2, 1800)]);
    }

    #[test]
    fn raw_values_are_clamped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        d.register(1, recorder(1, &log), None).unwrap();
        let mut rx = FakeReceiver::new();
        rx.values[0] = 2500;
        d.tick(Instant::now(), &mut rx);
        assert_eq!(log.lock().unwrap().as_slice(), &[(1, 2000)]);
        assert_eq!(d.channel_value(1), 2000);
    }

    #[test]
    fn failsafe_reasserts_every_tick_while_link_down() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        d.register(5, recorder(1, &log), Some(1500)).unwrap();
        let mut rx = FakeReceiver::new();
        rx.values[4] = 1750;
        let t0 = Instant::now();
        d.tick(t0, &mut rx);
        assert_eq!(log.lock().unwrap().as_slice(), &[(1, 1750)]);

        rx.link_up = false;
        for i in 1..=3 {
            d.tick(t0 + Duration::from_millis(1000 + 20 * i), &mut rx);
        }
        let writes = log.lock().unwrap().clone();
        assert_eq!(
            writes,
            vec![(1, 1750), (1, 1500), (1, 1500), (1, 1500)],
            "failsafe must land on every unhealthy tick"
        );
    }

    #[test]
    fn missing_failsafe_defaults_to_mid_point() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        d.register(3, recorder(1, &log), None).unwrap();
        let mut rx = FakeReceiver::new();
        rx.link_up = false;
        d.tick(Instant::now(), &mut rx);
        assert_eq!(log.lock().unwrap().as_slice(), &[(1, CHANNEL_MID)]);
    }

    #[test]
    fn recovery_renotifies_even_with_unchanged_value() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        d.register(1, recorder(1, &log), Some(1500)).unwrap();
        let mut rx = FakeReceiver::new();
        rx.values[0] = 1750;
        let t0 = Instant::now();
        d.tick(t0, &mut rx);
        rx.link_up = false;
        d.tick(t0 + Duration::from_millis(20), &mut rx);
        rx.link_up = true;
        d.tick(t0 + Duration::from_millis(40), &mut rx);
        let writes = log.lock().unwrap().clone();
        assert_eq!(writes, vec![(1, 1750), (1, 1500), (1, 1750)]);
    }

    #[test]
    fn channel_value_reports_failsafe_while_link_down() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        d.register(5, recorder(1, &log), Some(1200)).unwrap();
        let mut rx = FakeReceiver::new();
        rx.values[4] = 1750;
        let t0 = Instant::now();
        d.tick(t0, &mut rx);
        assert_eq!(d.channel_value(5), 1750);

        rx.link_up = false;
        d.tick(t0 + Duration::from_millis(20), &mut rx);
        assert_eq!(d.channel_value(5), 1200);
        // A channel with no bindings has nothing driving it.
        assert_eq!(d.channel_value(6), 0);

        rx.link_up = true;
        d.tick(t0 + Duration::from_millis(40), &mut rx);
        assert_eq!(d.channel_value(5), 1750);
    }

    #[test]
    fn recovery_renotifies_when_failsafe_equals_live_value() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        d.register(1, recorder(1, &log), Some(1750)).unwrap();
        let mut rx = FakeReceiver::new();
        rx.values[0] = 1750;
        let t0 = Instant::now();
        d.tick(t0, &mut rx);
        rx.link_up = false;
        d.tick(t0 + Duration::from_millis(20), &mut rx);
        rx.link_up = true;
        d.tick(t0 + Duration::from_millis(40), &mut rx);
        let writes = log.lock().unwrap().clone();
        assert_eq!(writes, vec![(1, 1750), (1, 1750), (1, 1750)]);
    }

    #[test]
    fn stale_signal_counts_as_not_receiving() {
        let mut d = ChannelDispatcher::with_signal_timeout(Duration::from_millis(100));
        let mut rx = FakeReceiver::new();
        let t0 = Instant::now();
        d.tick(t0, &mut rx);
        assert!(d.is_receiving(t0));
        assert!(!d.is_receiving(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn error_reflects_receiving_fault_and_configuration() {
        let mut d = ChannelDispatcher::new();
        let mut rx = FakeReceiver::new();
        let t0 = Instant::now();
        assert!(d.has_error(t0), "unconfigured must report error");
        assert_eq!(d.status(t0), LinkStatus::Unconfigured);

        d.mark_configured();
        d.tick(t0, &mut rx);
        assert!(!d.has_error(t0));
        assert_eq!(d.status(t0), LinkStatus::LinkUp);

        rx.link_up = false;
        d.tick(t0 + Duration::from_millis(1200), &mut rx);
        assert!(d.has_error(t0 + Duration::from_millis(1200)));
        assert_eq!(d.status(t0 + Duration::from_millis(1200)), LinkStatus::LinkDown);

        rx.link_up = true;
        d.tick(t0 + Duration::from_millis(1300), &mut rx);
        d.set_error();
        assert!(d.has_error(t0 + Duration::from_millis(1300)));
        assert_eq!(d.status(t0 + Duration::from_millis(1300)), LinkStatus::Error);
        d.clear_error();
        assert_eq!(d.status(t0 + Duration::from_millis(1300)), LinkStatus::LinkUp);
    }

    #[test]
    fn cleanup_drops_bindings_and_configuration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = ChannelDispatcher::new();
        d.register(1, recorder(1, &log), None).unwrap();
        d.mark_configured();
        d.cleanup();
        assert_eq!(d.binding_count(1), 0);
        let t0 = Instant::now();
        assert_eq!(d.status(t0), LinkStatus::Unconfigured);
        let mut rx = FakeReceiver::new();
        d.tick(t0, &mut rx);
        assert!(log.lock().unwrap().is_empty());
    }
}
