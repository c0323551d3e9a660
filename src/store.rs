//! Versioned, checksummed configuration persistence.
//!
//! The record is a fixed header followed by the canonical JSON payload:
//! magic, schema version, payload size, CRC32 (ISO-HDLC) over the payload,
//! and a write timestamp.  Every write is read back and re-checksummed
//! before commit; every read validates magic and checksum before the
//! payload is trusted, then runs the stored version through the migration
//! chain.  The checksum is verified over the bytes the header describes,
//! so corruption is detected before any migration touches the payload.

use std::time::{SystemTime, UNIX_EPOCH};

use crc::{CRC_32_ISO_HDLC, Crc};
use log::{info, warn};
use serde_json::Value;

use crate::config::Config;
use crate::error::PersistenceError;
use crate::ports::ByteStore;

/// Record magic.
pub const MAGIC: u32 = 0xB0C0_FFEE;
/// Schema version written by this firmware.
pub const CURRENT_VERSION: u16 = 2;
/// Default region size reserved in the backing store.
pub const DEFAULT_REGION_SIZE: usize = 2048;

const HEADER_LEN: usize = 16;
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Record header, little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    magic: u32,
    version: u16,
    data_size: u16,
    checksum: u32,
    timestamp: u32,
}

impl Header {
    fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.data_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf[12..16].copy_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            magic: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            version: u16::from_le_bytes([buf[4], buf[5]]),
            data_size: u16::from_le_bytes([buf[6], buf[7]]),
            checksum: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            timestamp: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        }
    }
}

/// Configuration record store over a raw byte region.
pub struct ConfigStore<S: ByteStore> {
    store: S,
    region_size: usize,
}

impl<S: ByteStore> ConfigStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_region_size(store, DEFAULT_REGION_SIZE)
    }

    pub fn with_region_size(store: S, region_size: usize) -> Self {
        Self { store, region_size }
    }

    /// Hand the backing store back, e.g. to rebuild the stack in tests.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Reserve the region in the backing store.
    pub fn begin(&mut self) -> Result<(), PersistenceError> {
        if self.store.begin(self.region_size) {
            Ok(())
        } else {
            Err(PersistenceError::StoreTooSmall)
        }
    }

    /// Persist a configuration: serialize, checksum, write, verify by
    /// read-back, then commit.
    pub fn write(&mut self, config: &Config) -> Result<(), PersistenceError> {
        let payload = config.to_json().into_bytes();
        if HEADER_LEN + payload.len() > self.region_size {
            return Err(PersistenceError::StoreTooSmall);
        }
        let checksum = CRC32.checksum(&payload);
        let header = Header {
            magic: MAGIC,
            version: CURRENT_VERSION,
            data_size: payload.len() as u16,
            checksum,
            timestamp: unix_now(),
        };
        self.store.write_at(0, &header.encode());
        self.store.write_at(HEADER_LEN, &payload);

        let mut readback = vec![0u8; payload.len()];
        self.store.read_at(HEADER_LEN, &mut readback);
        if CRC32.checksum(&readback) != checksum {
            warn!("store read-back disagrees with written payload");
            return Err(PersistenceError::WriteVerificationMismatch);
        }

        if self.store.commit() {
            info!("config persisted ({} bytes, v{CURRENT_VERSION})", payload.len());
            Ok(())
        } else {
            Err(PersistenceError::CommitFailed)
        }
    }

    /// Load and validate the stored configuration, migrating old schema
    /// versions forward.
    pub fn read(&self) -> Result<Config, PersistenceError> {
        let mut hbuf = [0u8; HEADER_LEN];
        self.store.read_at(0, &mut hbuf);
        let header = Header::decode(&hbuf);

        if header.magic != MAGIC {
            return Err(PersistenceError::InvalidMagic(header.magic));
        }
        let size = usize::from(header.data_size);
        if HEADER_LEN + size > self.region_size {
            return Err(PersistenceError::TruncatedRecord);
        }

        let mut payload = vec![0u8; size];
        self.store.read_at(HEADER_LEN, &mut payload);
        if CRC32.checksum(&payload) != header.checksum {
            return Err(PersistenceError::ChecksumMismatch);
        }

        let json = migrate(&payload, header.version)?;
        Ok(Config::from_json_lossy(&json))
    }

    /// Zero the whole region and commit.  Used to recover from corruption.
    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        let zeros = [0u8; 64];
        let mut offset = 0;
        while offset < self.region_size {
            let chunk = zeros.len().min(self.region_size - offset);
            self.store.write_at(offset, &zeros[..chunk]);
            offset += chunk;
        }
        if self.store.commit() {
            info!("config region cleared");
            Ok(())
        } else {
            Err(PersistenceError::CommitFailed)
        }
    }
}

type MigrationStep = fn(Value) -> Value;

/// Per-version migration steps.  Each step lifts version `from` to
/// `from + 1`; a gap in the chain is a `NoMigrationPath`.
fn migration_step(from: u16) -> Option<MigrationStep> {
    match from {
        1 => Some(migrate_v1_to_v2),
        _ => None,
    }
}

/// V1 records predate the configurable access point: fill in the default
/// credentials and keep-running flag.
fn migrate_v1_to_v2(mut doc: Value) -> Value {
    if let Some(obj) = doc.as_object_mut() {
        obj.entry("apSsid").or_insert_with(|| "Bordcomputer".into());
        obj.entry("apPassword").or_insert_with(|| "bordcomputer".into());
        obj.entry("keepWebServerRunning").or_insert(Value::Bool(false));
    }
    doc
}

fn migrate(payload: &[u8], version: u16) -> Result<String, PersistenceError> {
    let json = String::from_utf8_lossy(payload).into_owned();
    if version == CURRENT_VERSION {
        return Ok(json);
    }
    if version > CURRENT_VERSION {
        return Err(PersistenceError::NoMigrationPath(version));
    }

    let Ok(mut doc) = serde_json::from_str::<Value>(&json) else {
        // Checksum held but the payload is not JSON; let the lossy parser
        // produce defaults downstream.
        return Ok(json);
    };
    let mut v = version;
    while v < CURRENT_VERSION {
        let step = migration_step(v).ok_or(PersistenceError::NoMigrationPath(v))?;
        doc = step(doc);
        v += 1;
    }
    info!("migrated stored config v{version} -> v{CURRENT_VERSION}");
    Ok(doc.to_string())
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
