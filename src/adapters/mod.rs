//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements    | Connects to                    |
//! |------------|---------------|--------------------------------|
//! | `eeprom`   | ByteStore     | NVS blob / in-memory region    |
//! | `outputs`  | OutputFactory | LEDC + GPIO / journaling sim   |
//! | `log_sink` | FrameSink     | Serial log output              |

pub mod eeprom;
pub mod log_sink;
pub mod outputs;

/// ESP-IDF bootstrap for the device binary: apply the runtime link
/// patches and route the `log` facade to the IDF console.  Call once,
/// first thing in `main`.
#[cfg(target_os = "espidf")]
pub fn init_platform() {
    esp_idf_svc::sys::link_patches();
    if let Err(e) = esp_idf_logger::init() {
        // No logger to report through yet.
        eprintln!("logger init failed: {e}");
    }
}
