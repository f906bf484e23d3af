//! Port traits: the hexagonal boundary between the relay engine and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (bus client, published service, settings store, event
//! sinks) implement these traits. The [`AppService`](super::service::AppService)
//! consumes them via generics, so the engine never touches the transport
//! directly and never assembles path strings.
//!
//! ## Contract notes
//!
//! - **BusPort** reads are best-effort: `None` means "unavailable right now"
//!   and is handled by the retry guard, never as an error.
//! - **BusPort** writes may be rejected; the engine logs and carries on.
//! - **SettingsPort** implementations MUST validate before persisting.

use crate::config::{ControlMode, SensorSettings, SystemConfig};
use crate::relays::RelayId;
use crate::sensors::SensorId;

// ───────────────────────────────────────────────────────────────
// Bus port (driven adapter: shared bus ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Read/write access to the values other processes publish on the bus.
pub trait BusPort {
    /// Physical state of a relay, if readable.
    fn relay_state(&self, relay: RelayId) -> Option<bool>;

    /// Raw function code assigned to a relay, if readable.
    fn relay_function(&self, relay: RelayId) -> Option<i32>;

    /// Current temperature of a sensor; `None` when the read failed.
    fn temperature(&self, sensor: &SensorId) -> Option<f32>;

    /// Every temperature sensor currently present on the bus.
    fn temperature_sensors(&self) -> Vec<SensorId>;

    /// Command a relay.
    fn set_relay_state(&mut self, relay: RelayId, active: bool) -> Result<(), BusError>;
}

// ───────────────────────────────────────────────────────────────
// Service port (driven adapter: domain → published service object)
// ───────────────────────────────────────────────────────────────

/// The controller's own service object on the bus.
///
/// It exists only while at least one relay is configured for temperature
/// control. Per sensor it exposes the enable flag, each slot's settings
/// and each slot's activity.
///
/// The enable flag, the slot settings and the mode are writable by other
/// processes. Adapters report such writes as
/// [`AppCommand`](super::commands::AppCommand)s; the engine persists
/// accepted values and republishes the current ones when it rejects a
/// write.
pub trait ServicePort {
    /// Create the service object. Called when the engine becomes needed.
    fn register(&mut self);

    /// Remove the service object and everything under it.
    fn unregister(&mut self);

    fn is_registered(&self) -> bool;

    /// Publish (or republish) a sensor's settings.
    fn publish_sensor(&mut self, sensor: &SensorId, settings: &SensorSettings);

    /// Remove a sensor's entries.
    fn withdraw_sensor(&mut self, sensor: &SensorId);

    /// Publish one condition slot's activity.
    fn publish_condition_state(&mut self, sensor: &SensorId, slot: usize, active: bool);

    /// Publish the controller mode.
    fn publish_mode(&mut self, mode: ControlMode);

    /// Publish the ids of every tracked temperature sensor.
    fn publish_available_sensors(&mut self, sensors: &[SensorId]);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Settings port (driven adapter: domain ↔ persisted settings)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the controller and per-sensor settings.
pub trait SettingsPort {
    /// Load the system configuration, or defaults if none is stored.
    fn load_config(&self) -> Result<SystemConfig, SettingsError>;

    /// Validate and persist the system configuration.
    fn save_config(&mut self, config: &SystemConfig) -> Result<(), SettingsError>;

    /// Load one sensor's settings, or defaults if none are stored.
    fn load_sensor(&self, sensor: &SensorId) -> Result<SensorSettings, SettingsError>;

    /// Validate and persist one sensor's settings.
    fn save_sensor(&mut self, sensor: &SensorId, settings: &SensorSettings)
    -> Result<(), SettingsError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`BusPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The owning service refused the value.
    WriteRejected,
    /// The target service or path is not on the bus.
    NotFound,
    /// Transport-level failure.
    Io,
}

/// Errors from [`SettingsPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Stored settings failed deserialisation.
    Corrupted,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    Io,
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::WriteRejected => write!(f, "write rejected"),
            Self::NotFound => write!(f, "not found"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "settings corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Io => write!(f, "I/O error"),
        }
    }
}
