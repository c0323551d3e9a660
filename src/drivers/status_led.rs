//! Status LED driver — one LEDC PWM channel.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: configures and drives an LEDC channel on the board LED.
//! On host/test: tracks brightness in-memory only.

/// Board status LED GPIO.
pub const STATUS_LED_GPIO: i32 = 2;

pub struct StatusLed {
    brightness: u8,
}

impl StatusLed {
    /// Configures the LEDC timer and channel on first use.
    pub fn new() -> Self {
        backend::init();
        Self { brightness: 0 }
    }

    pub fn set_brightness(&mut self, level: u8) {
        backend::ledc_set(level);
        self.brightness = level;
    }

    pub fn off(&mut self) {
        self.set_brightness(0);
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }
}

impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
mod backend {
    use esp_idf_svc::sys::{
        ledc_channel_config, ledc_channel_config_t, ledc_channel_t_LEDC_CHANNEL_0,
        ledc_mode_t_LEDC_LOW_SPEED_MODE, ledc_set_duty, ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        ledc_timer_config, ledc_timer_config_t, ledc_timer_t_LEDC_TIMER_0, ledc_update_duty,
    };

    pub fn init() {
        // SAFETY: Called once from the single-threaded boot path before the
        // control loop starts driving duty writes.
        unsafe {
            let timer = ledc_timer_config_t {
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                timer_num: ledc_timer_t_LEDC_TIMER_0,
                duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
                freq_hz: 1_000,
                ..Default::default()
            };
            ledc_timer_config(&timer);

            ledc_channel_config(&ledc_channel_config_t {
                gpio_num: super::STATUS_LED_GPIO,
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel: ledc_channel_t_LEDC_CHANNEL_0,
                timer_sel: ledc_timer_t_LEDC_TIMER_0,
                duty: 0,
                ..Default::default()
            });
        }
    }

    pub fn ledc_set(duty: u8) {
        // SAFETY: The channel was configured in init(); duty register writes
        // are race-free since only the control loop calls this.
        unsafe {
            ledc_set_duty(
                ledc_mode_t_LEDC_LOW_SPEED_MODE,
                ledc_channel_t_LEDC_CHANNEL_0,
                u32::from(duty),
            );
            ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, ledc_channel_t_LEDC_CHANNEL_0);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod backend {
    pub fn init() {}
    pub fn ledc_set(_duty: u8) {}
}
