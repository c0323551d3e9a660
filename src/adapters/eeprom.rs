//! EEPROM-style persistent byte region.
//!
//! Implements [`ByteStore`] for the config record.
//!
//! ## Dual-target design
//!
//! On ESP-IDF the region is a RAM cache persisted as a single NVS blob;
//! `commit()` writes the blob and calls `nvs_commit`, which is atomic.
//! On host/test the "medium" is a second in-memory buffer, with fault
//! hooks so the verification and recovery paths can be exercised.

#[cfg(target_os = "espidf")]
use log::{info, warn};

use crate::ports::ByteStore;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NVS_NAMESPACE: &[u8] = b"bordcomputer\0";
#[cfg(target_os = "espidf")]
const NVS_KEY: &[u8] = b"eeprom\0";

pub struct EepromRegion {
    /// Staged bytes; reads and writes go here until commit.
    cache: Vec<u8>,
    #[cfg(not(target_os = "espidf"))]
    committed: Vec<u8>,
    #[cfg(not(target_os = "espidf"))]
    fail_commits: bool,
}

impl EepromRegion {
    pub fn new() -> Self {
        Self {
            cache: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            committed: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            fail_commits: false,
        }
    }
}

impl Default for EepromRegion {
    fn default() -> Self {
        Self::new()
    }
}

// Host-only fault hooks for the persistence tests.
#[cfg(not(target_os = "espidf"))]
impl EepromRegion {
    /// Make every following commit fail.
    pub fn set_fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    /// Flip one bit in the committed medium, as a bad flash sector would.
    pub fn corrupt_committed_byte(&mut self, offset: usize) {
        if let Some(b) = self.committed.get_mut(offset) {
            *b ^= 0x01;
        }
        if let Some(b) = self.cache.get_mut(offset) {
            *b ^= 0x01;
        }
    }
}

#[cfg(target_os = "espidf")]
impl EepromRegion {
    /// Open the NVS namespace, run `f` with the handle, close it again.
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        // SAFETY: namespace is a valid NUL-terminated string; handle is
        // closed before return on every path.
        let ret = unsafe { nvs_open(NVS_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    fn init_flash() -> bool {
        // SAFETY: called from the single main-task context before any
        // concurrent NVS access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("NVS: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK {
                return false;
            }
            return unsafe { nvs_flash_init() } == ESP_OK;
        }
        ret == ESP_OK
    }

    fn load_blob(&mut self) {
        let size = self.cache.len();
        let result = Self::with_nvs_handle(false, |handle| {
            let mut got = size;
            // SAFETY: buffer outlives the call; got is clamped by NVS to
            // the blob length.
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    NVS_KEY.as_ptr() as *const _,
                    self.cache.as_mut_ptr() as *mut _,
                    &mut got,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(got)
        });
        match result {
            Ok(got) => info!("eeprom: loaded {got} bytes from NVS"),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => info!("eeprom: no stored blob"),
            Err(e) => warn!("eeprom: NVS read error {e}"),
        }
    }
}

impl ByteStore for EepromRegion {
    fn begin(&mut self, size: usize) -> bool {
        #[cfg(target_os = "espidf")]
        {
            if !Self::init_flash() {
                return false;
            }
            self.cache = vec![0u8; size];
            self.load_blob();
            true
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.committed.resize(size, 0);
            self.cache = self.committed.clone();
            true
        }
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) {
        let offset = offset.min(self.cache.len());
        let end = (offset + buf.len()).min(self.cache.len());
        let n = end.saturating_sub(offset);
        buf[..n].copy_from_slice(&self.cache[offset..end]);
        for b in &mut buf[n..] {
            *b = 0;
        }
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) {
        let offset = offset.min(self.cache.len());
        let end = (offset + data.len()).min(self.cache.len());
        let n = end.saturating_sub(offset);
        self.cache[offset..end].copy_from_slice(&data[..n]);
    }

    fn commit(&mut self) -> bool {
        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                // SAFETY: cache is a live buffer for the duration of the call.
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        NVS_KEY.as_ptr() as *const _,
                        self.cache.as_ptr() as *const _,
                        self.cache.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            if let Err(e) = result {
                warn!("eeprom: NVS commit error {e}");
                return false;
            }
            true
        }

        #[cfg(not(target_os = "espidf"))]
        {
            if self.fail_commits {
                return false;
            }
            self.committed = self.cache.clone();
            true
        }
    }

    fn capacity(&self) -> usize {
        self.cache.len()
    }
}
