//! Unified error types for the relay controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! top-level control loop's error handling uniform. All variants are `Copy`
//! so they can be passed through the tick path without allocation.
//!
//! Only [`Error::Internal`] is fatal: the process logs it and exits rather
//! than keep driving relays from state it can no longer trust.

use core::fmt;

use crate::app::ports::{BusError, SettingsError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The external bus rejected a read or write.
    Bus(BusError),
    /// The settings store failed or rejected a value.
    Settings(SettingsError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// In-memory state violated an invariant; the tick was aborted.
    Internal(&'static str),
}

impl Error {
    /// True if the control loop must stop.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Settings(e) => write!(f, "settings: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Internal(msg) => write!(f, "internal: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<SettingsError> for Error {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
