//! System and per-sensor configuration
//!
//! All tunable parameters for the relay controller, plus the typed record
//! that replaces the flat per-sensor settings keys of the settings store.
//! Values are loaded through [`SettingsPort`](crate::app::ports::SettingsPort)
//! and validated before they reach the engine.

use serde::{Deserialize, Serialize};

use crate::app::ports::SettingsError;
use crate::relays::RelayId;

/// Number of condition slots each sensor owns.
pub const CONDITION_SLOTS: usize = 2;

/// Raw relay setting meaning "this condition drives nothing".
pub const RELAY_UNASSIGNED: i32 = -1;

/// Relay function code reported by the relay settings for temperature control.
pub const TEMPERATURE_FUNCTION_CODE: i32 = 4;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Timing ---
    /// Evaluation tick interval (milliseconds)
    pub tick_interval_ms: u32,
    /// Status report interval (seconds)
    pub status_interval_secs: u32,

    // --- Retry ---
    /// Consecutive failed reads tolerated before conditions are released
    pub retry_limit: u32,
    /// Log a "retrying" line every N consecutive failed reads
    pub retry_log_every: u32,

    // --- Relays ---
    /// Relay function code that hands a relay to this controller
    pub temperature_function_code: i32,

    // --- Mode ---
    /// Published mode setting (not consumed by evaluation)
    pub mode: ControlMode,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Timing
            tick_interval_ms: 1000,    // 1 Hz
            status_interval_secs: 60, // 1/min

            // Retry: 300 ticks at 1 Hz = 5 minute grace period
            retry_limit: 300,
            retry_log_every: 10,

            // Relays
            temperature_function_code: TEMPERATURE_FUNCTION_CODE,

            mode: ControlMode::Auto,
        }
    }
}

/// Published controller mode. Surfaced for the settings layer only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ControlMode {
    #[default]
    Auto = 0,
    On = 1,
    Off = 2,
}

impl TryFrom<u8> for ControlMode {
    type Error = SettingsError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Auto),
            1 => Ok(Self::On),
            2 => Ok(Self::Off),
            _ => Err(SettingsError::ValidationFailed("mode must be 0, 1 or 2")),
        }
    }
}

impl From<ControlMode> for u8 {
    fn from(mode: ControlMode) -> Self {
        mode as u8
    }
}

// ---------------------------------------------------------------------------
// Per-sensor settings
// ---------------------------------------------------------------------------

/// Thresholds and relay assignment of one condition slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSettings {
    /// Relay index as stored; [`RELAY_UNASSIGNED`] when unassigned.
    pub relay: i32,
    /// Threshold at which the condition becomes active.
    pub set_value: f32,
    /// Threshold at which the condition clears.
    pub clear_value: f32,
}

impl Default for ConditionSettings {
    fn default() -> Self {
        Self {
            relay: RELAY_UNASSIGNED,
            set_value: 0.0,
            clear_value: 0.0,
        }
    }
}

impl ConditionSettings {
    /// The relay this condition drives, if the stored index names one.
    ///
    /// Indexes that do not exist on this controller are treated exactly
    /// like the unassigned sentinel.
    pub fn relay_id(&self) -> Option<RelayId> {
        RelayId::from_setting(self.relay)
    }
}

/// User configuration of one temperature sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    pub enabled: bool,
    pub conditions: [ConditionSettings; CONDITION_SLOTS],
}

/// A single typed change to a sensor's settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingChange {
    Enabled(bool),
    Relay { slot: usize, relay: i32 },
    SetValue { slot: usize, value: f32 },
    ClearValue { slot: usize, value: f32 },
}

impl SensorSettings {
    /// Apply one change, validating the affected field first.
    pub fn apply(&mut self, change: SettingChange) -> Result<(), SettingsError> {
        match change {
            SettingChange::Enabled(on) => self.enabled = on,
            SettingChange::Relay { slot, relay } => {
                validate_relay(relay)?;
                slot_mut(&mut self.conditions, slot)?.relay = relay;
            }
            SettingChange::SetValue { slot, value } => {
                validate_threshold(value)?;
                slot_mut(&mut self.conditions, slot)?.set_value = value;
            }
            SettingChange::ClearValue { slot, value } => {
                validate_threshold(value)?;
                slot_mut(&mut self.conditions, slot)?.clear_value = value;
            }
        }
        Ok(())
    }

    /// Every change needed to turn `self` into `other`, in slot order.
    pub fn diff(&self, other: &SensorSettings) -> Vec<SettingChange> {
        let mut changes = Vec::new();
        if self.enabled != other.enabled {
            changes.push(SettingChange::Enabled(other.enabled));
        }
        for (slot, (a, b)) in self.conditions.iter().zip(&other.conditions).enumerate() {
            if a.relay != b.relay {
                changes.push(SettingChange::Relay { slot, relay: b.relay });
            }
            if a.set_value != b.set_value {
                changes.push(SettingChange::SetValue { slot, value: b.set_value });
            }
            if a.clear_value != b.clear_value {
                changes.push(SettingChange::ClearValue { slot, value: b.clear_value });
            }
        }
        changes
    }
}

fn slot_mut(
    conditions: &mut [ConditionSettings; CONDITION_SLOTS],
    slot: usize,
) -> Result<&mut ConditionSettings, SettingsError> {
    conditions
        .get_mut(slot)
        .ok_or(SettingsError::ValidationFailed("condition slot must be 0 or 1"))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

const THRESHOLD_MIN: f32 = -100.0;
const THRESHOLD_MAX: f32 = 100.0;
const RELAY_MAX: i32 = 100;

fn validate_threshold(value: f32) -> Result<(), SettingsError> {
    if !(THRESHOLD_MIN..=THRESHOLD_MAX).contains(&value) {
        return Err(SettingsError::ValidationFailed(
            "thresholds must be -100.0–100.0",
        ));
    }
    Ok(())
}

fn validate_relay(relay: i32) -> Result<(), SettingsError> {
    if !(RELAY_UNASSIGNED..=RELAY_MAX).contains(&relay) {
        return Err(SettingsError::ValidationFailed("relay must be -1–100"));
    }
    Ok(())
}

/// Range-check a full sensor record before it is stored or used.
pub fn validate_sensor_settings(settings: &SensorSettings) -> Result<(), SettingsError> {
    for c in &settings.conditions {
        validate_relay(c.relay)?;
        validate_threshold(c.set_value)?;
        validate_threshold(c.clear_value)?;
    }
    Ok(())
}

/// Range-check the system configuration.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), SettingsError> {
    if !(100..=10_000).contains(&cfg.tick_interval_ms) {
        return Err(SettingsError::ValidationFailed(
            "tick_interval_ms must be 100–10000",
        ));
    }
    if !(1..=86_400).contains(&cfg.retry_limit) {
        return Err(SettingsError::ValidationFailed(
            "retry_limit must be 1–86400",
        ));
    }
    if cfg.retry_log_every == 0 {
        return Err(SettingsError::ValidationFailed(
            "retry_log_every must be at least 1",
        ));
    }
    if !(1..=3600).contains(&cfg.status_interval_secs) {
        return Err(SettingsError::ValidationFailed(
            "status_interval_secs must be 1–3600",
        ));
    }
    Ok(())
}
