//! Output pin factories.
//!
//! [`SimOutputs`] journals every pin write in memory and backs the host
//! test suites.  [`HardwareOutputs`] (ESP-IDF only) hands out LEDC PWM
//! channels and plain GPIO outputs.

use std::sync::{Arc, Mutex};

use crate::error::ConfigValidationError;
use crate::ports::{DigitalPin, OutputFactory, PwmPin};

// ---------------------------------------------------------------------------
// Simulation backend
// ---------------------------------------------------------------------------

/// One recorded pin write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    Pwm { gpio: u8, duty: u8 },
    Digital { gpio: u8, high: bool },
}

/// Journaling factory.  All pins created by one instance share a journal,
/// so a test can assert on the interleaved write history.
pub struct SimOutputs {
    journal: Arc<Mutex<Vec<PinEvent>>>,
}

impl SimOutputs {
    pub fn new() -> Self {
        Self {
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<PinEvent> {
        self.journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    pub fn last_pwm(&self, gpio: u8) -> Option<u8> {
        self.events().iter().rev().find_map(|e| match e {
            PinEvent::Pwm { gpio: g, duty } if *g == gpio => Some(*duty),
            _ => None,
        })
    }

    pub fn last_level(&self, gpio: u8) -> Option<bool> {
        self.events().iter().rev().find_map(|e| match e {
            PinEvent::Digital { gpio: g, high } if *g == gpio => Some(*high),
            _ => None,
        })
    }
}

impl Default for SimOutputs {
    fn default() -> Self {
        Self::new()
    }
}

struct SimDigitalPin {
    gpio: u8,
    journal: Arc<Mutex<Vec<PinEvent>>>,
}

impl DigitalPin for SimDigitalPin {
    fn set_level(&mut self, high: bool) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(PinEvent::Digital {
                gpio: self.gpio,
                high,
            });
        }
    }
}

struct SimPwmPin {
    gpio: u8,
    journal: Arc<Mutex<Vec<PinEvent>>>,
}

impl PwmPin for SimPwmPin {
    fn set_duty(&mut self, duty: u8) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(PinEvent::Pwm {
                gpio: self.gpio,
                duty,
            });
        }
    }
}

impl OutputFactory for SimOutputs {
    fn digital(&mut self, gpio: u8) -> Result<Box<dyn DigitalPin>, ConfigValidationError> {
        Ok(Box::new(SimDigitalPin {
            gpio,
            journal: Arc::clone(&self.journal),
        }))
    }

    fn pwm(&mut self, gpio: u8) -> Result<Box<dyn PwmPin>, ConfigValidationError> {
        Ok(Box::new(SimPwmPin {
            gpio,
            journal: Arc::clone(&self.journal),
        }))
    }
}

// ---------------------------------------------------------------------------
// ESP-IDF backend
// ---------------------------------------------------------------------------

/// LEDC-backed factory.  Channel 0 belongs to the status LED; handlers get
/// the remaining channels, one per PWM pin.
#[cfg(target_os = "espidf")]
pub struct HardwareOutputs {
    next_channel: u32,
}

#[cfg(target_os = "espidf")]
impl HardwareOutputs {
    /// ESP32-C3 LEDC exposes 6 channels.
    const CHANNEL_LIMIT: u32 = 6;

    pub fn new() -> Self {
        Self { next_channel: 1 }
    }

    /// Re-applying a configuration rebuilds every handler, so the channel
    /// allocator starts over as well.
    pub fn reset(&mut self) {
        self.next_channel = 1;
    }
}

#[cfg(target_os = "espidf")]
mod esp_impl {
    use esp_idf_svc::sys::*;
    use log::warn;

    use super::HardwareOutputs;
    use crate::error::ConfigValidationError;
    use crate::ports::{DigitalPin, OutputFactory, PwmPin};

    struct EspDigitalPin {
        gpio: i32,
    }

    impl DigitalPin for EspDigitalPin {
        fn set_level(&mut self, high: bool) {
            // SAFETY: the pin was configured as an output in digital().
            unsafe {
                gpio_set_level(self.gpio, u32::from(high));
            }
        }
    }

    struct EspPwmPin {
        channel: u32,
    }

    impl PwmPin for EspPwmPin {
        fn set_duty(&mut self, duty: u8) {
            // SAFETY: the channel was configured in pwm(); duty register
            // writes are race-free per channel.
            unsafe {
                ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, self.channel, u32::from(duty));
                ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, self.channel);
            }
        }
    }

    impl OutputFactory for HardwareOutputs {
        fn digital(
            &mut self,
            gpio: u8,
        ) -> Result<Box<dyn DigitalPin>, ConfigValidationError> {
            let cfg = gpio_config_t {
                pin_bit_mask: 1u64 << gpio,
                mode: gpio_mode_t_GPIO_MODE_OUTPUT,
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            // SAFETY: called from the apply path on the main task.
            let ret = unsafe { gpio_config(&cfg) };
            if ret != ESP_OK {
                warn!("gpio_config({gpio}) failed: {ret}");
                return Err(ConfigValidationError::InvalidPin);
            }
            unsafe {
                gpio_set_level(i32::from(gpio), 0);
            }
            Ok(Box::new(EspDigitalPin {
                gpio: i32::from(gpio),
            }))
        }

        fn pwm(&mut self, gpio: u8) -> Result<Box<dyn PwmPin>, ConfigValidationError> {
            if self.next_channel >= Self::CHANNEL_LIMIT {
                warn!("no free LEDC channel for gpio {gpio}");
                return Err(ConfigValidationError::InvalidPin);
            }
            let channel = self.next_channel;
            // SAFETY: timer 0 is configured once by StatusLed::new(); each
            // channel is configured exactly once per allocation.
            let ret = unsafe {
                ledc_channel_config(&ledc_channel_config_t {
                    gpio_num: i32::from(gpio),
                    speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                    channel,
                    timer_sel: ledc_timer_t_LEDC_TIMER_0,
                    duty: 0,
                    ..Default::default()
                })
            };
            if ret != ESP_OK {
                warn!("ledc_channel_config({gpio}) failed: {ret}");
                return Err(ConfigValidationError::InvalidPin);
            }
            self.next_channel += 1;
            Ok(Box::new(EspPwmPin { channel }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_records_interleaved_writes() {
        let mut outputs = SimOutputs::new();
        let mut servo = outputs.pwm(6).unwrap();
        let mut lamp = outputs.digital(9).unwrap();
        servo.set_duty(90);
        lamp.set_level(true);
        servo.set_duty(180);
        assert_eq!(
            outputs.events(),
            vec![
                PinEvent::Pwm { gpio: 6, duty: 90 },
                PinEvent::Digital { gpio: 9, high: true },
                PinEvent::Pwm { gpio: 6, duty: 180 },
            ]
        );
        assert_eq!(outputs.last_pwm(6), Some(180));
        assert_eq!(outputs.last_level(9), Some(true));
        assert_eq!(outputs.last_pwm(5), None);
    }
}
