//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them, usually logging them.

use serde::Serialize;

use crate::config::ControlMode;
use crate::relays::{RELAY_COUNT, RelayId};
use crate::sensors::SensorId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Periodic status snapshot.
    Status(StatusSnapshot),

    /// The engine took control of the relays (first relay configured).
    Activated,

    /// The engine released control (last relay unconfigured).
    Deactivated,

    /// A sensor started being tracked.
    SensorAdded(SensorId),

    /// A sensor stopped being tracked.
    SensorRemoved(SensorId),

    /// A condition slot changed activity.
    ConditionChanged {
        sensor: SensorId,
        slot: usize,
        active: bool,
    },

    /// A sensor exhausted its retry grace period.
    SensorExhausted(SensorId),

    /// A relay was commanded.
    RelaySwitched { relay: RelayId, active: bool },

    /// The bus rejected a relay command.
    RelayWriteFailed(RelayId),
}

/// A point-in-time status snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub active: bool,
    pub mode: ControlMode,
    pub tick_count: u64,
    pub sensor_count: usize,
    pub enabled_sensors: usize,
    /// Bitmask of relays configured for temperature control.
    pub configured_relays: u8,
    pub desired_relays: [bool; RELAY_COUNT],
}
