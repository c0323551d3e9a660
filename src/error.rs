//! Unified error types for the board computer.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level control loop's error handling uniform.  All variants are `Copy`
//! so they can be cheaply passed through the dispatch loop and the status
//! indicator without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A configuration entry failed validation during apply.
    Validation(ConfigValidationError),
    /// The persisted configuration record is unreadable or unwritable.
    Persistence(PersistenceError),
    /// A handler could not be bound to a channel.
    Dispatch(DispatchError),
    /// The network service could not be brought up.
    Network(NetworkServiceError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Persistence(e) => write!(f, "persistence: {e}"),
            Self::Dispatch(e) => write!(f, "dispatch: {e}"),
            Self::Network(e) => write!(f, "network: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// The pin does not exist on this board, or a PWM handler targets a pin
    /// without PWM capability.
    InvalidPin,
    /// Channel number outside 1..=16.
    InvalidChannel(u8),
    /// Failsafe value outside the 1000..=2000 channel range.
    OutOfRangeFailsafe(u16),
    /// PWM output range with `min >= max`.
    InvalidPwmRange { min: u8, max: u8 },
    /// Handler `type` string not recognised; the entry is skipped.
    UnknownHandlerType,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPin => write!(f, "invalid pin"),
            Self::InvalidChannel(ch) => write!(f, "invalid channel {ch}"),
            Self::OutOfRangeFailsafe(v) => write!(f, "failsafe {v} out of range"),
            Self::InvalidPwmRange { min, max } => {
                write!(f, "PWM range min {min} >= max {max}")
            }
            Self::UnknownHandlerType => write!(f, "unknown handler type"),
        }
    }
}

impl From<ConfigValidationError> for Error {
    fn from(e: ConfigValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceError {
    /// Stored header does not carry the expected magic number.
    InvalidMagic(u32),
    /// Stored payload does not match the checksum in its header.
    ChecksumMismatch,
    /// Read-back after write disagrees with what was written.
    WriteVerificationMismatch,
    /// No migration step is registered for the stored schema version.
    NoMigrationPath(u16),
    /// Header claims more payload bytes than the region holds.
    TruncatedRecord,
    /// The backing region is too small for the record.
    StoreTooSmall,
    /// The backing store rejected the commit.
    CommitFailed,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMagic(m) => write!(f, "invalid magic {m:#010x}"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::WriteVerificationMismatch => write!(f, "write verification mismatch"),
            Self::NoMigrationPath(v) => write!(f, "no migration path from version {v}"),
            Self::TruncatedRecord => write!(f, "truncated record"),
            Self::StoreTooSmall => write!(f, "store too small"),
            Self::CommitFailed => write!(f, "commit failed"),
        }
    }
}

impl From<PersistenceError> for Error {
    fn from(e: PersistenceError) -> Self {
        Self::Persistence(e)
    }
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// Channel number outside 1..=16 at registration time.
    ChannelOutOfRange(u8),
    /// The channel already carries the maximum number of bindings.
    HandlerCapacityExceeded(u8),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelOutOfRange(ch) => write!(f, "channel {ch} out of range"),
            Self::HandlerCapacityExceeded(ch) => {
                write!(f, "handler capacity exceeded on channel {ch}")
            }
        }
    }
}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

// ---------------------------------------------------------------------------
// Network service errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkServiceError {
    /// The web asset store could not be mounted or lacks the UI bundle.
    AssetStoreUnavailable,
    /// A listener socket could not be bound.
    BindFailure,
}

impl fmt::Display for NetworkServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssetStoreUnavailable => write!(f, "asset store unavailable"),
            Self::BindFailure => write!(f, "bind failure"),
        }
    }
}

impl From<NetworkServiceError> for Error {
    fn from(e: NetworkServiceError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
