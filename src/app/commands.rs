//! Inbound notifications to the application service.
//!
//! These arrive asynchronously from the bus and the settings store between
//! ticks. The [`AppService`](super::service::AppService) applies each one
//! completely before the next tick runs.

use crate::config::{ControlMode, SettingChange};
use crate::relays::RelayId;
use crate::sensors::SensorId;

/// Notifications that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// A relay's function setting changed (`None`: no longer readable).
    RelayFunctionChanged { relay: RelayId, code: Option<i32> },

    /// A temperature sensor service appeared on the bus.
    DeviceAdded(SensorId),

    /// A temperature sensor service left the bus.
    DeviceRemoved(SensorId),

    /// A per-sensor setting changed in the settings store or was written
    /// to the published service.
    SettingChanged { sensor: SensorId, change: SettingChange },

    /// The published mode setting changed.
    SetMode(ControlMode),
}
