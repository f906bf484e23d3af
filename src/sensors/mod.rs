//! Sensor subsystem: per-sensor records and the keyed [`SensorTable`].
//!
//! A [`Sensor`] is created when its temperature service shows up on the bus
//! (or when an unseen id is enabled by the user) and dropped when the
//! service disappears. Nothing here is persisted; the settings store owns
//! the user configuration.
//!
//! Each tick the sensor feeds its reading to its retry guard and then runs
//! the condition tracker with the guard's decision.

pub mod condition;

use core::fmt;
use std::collections::BTreeMap;

use log::{info, warn};

use crate::app::ports::SettingsError;
use crate::config::{CONDITION_SLOTS, SensorSettings, SettingChange};
use crate::control::retry::{Freshness, RetryAction, RetryDecision, RetryGuard};
use crate::error::{Error, Result};
use crate::relays::RelayId;

use condition::{Condition, TrackOutcome};

/// Maximum length of a sensor id in bytes.
pub const SENSOR_ID_CAP: usize = 64;

/// Stable identifier of a temperature sensor (e.g. `adc_builtin0_6`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorId(heapless::String<SENSOR_ID_CAP>);

impl SensorId {
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::Config("sensor id is empty"));
        }
        let mut s = heapless::String::new();
        s.push_str(id)
            .map_err(|()| Error::Config("sensor id exceeds 64 bytes"))?;
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor record
// ───────────────────────────────────────────────────────────────

/// Retry guard event reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryNotice {
    Recovered,
    Retrying { attempt: u32, limit: u32 },
    Exhausted { attempts: u32 },
}

/// Live state of one temperature sensor.
#[derive(Debug, Clone)]
pub struct Sensor {
    id: SensorId,
    enabled: bool,
    /// Last reading; `None` when the read failed.
    temperature: Option<f32>,
    retry: RetryGuard,
    conditions: [Condition; CONDITION_SLOTS],
}

impl Sensor {
    pub fn new(id: SensorId, settings: SensorSettings, retry_limit: u32) -> Self {
        let [c0, c1] = settings.conditions;
        Self {
            id,
            enabled: settings.enabled,
            temperature: None,
            retry: RetryGuard::new(retry_limit),
            conditions: [Condition::new(c0), Condition::new(c1)],
        }
    }

    pub fn id(&self) -> &SensorId {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn failed_reads(&self) -> u32 {
        self.retry.failed_reads()
    }

    pub fn freshness(&self) -> Freshness {
        self.retry.freshness()
    }

    pub fn conditions(&self) -> &[Condition; CONDITION_SLOTS] {
        &self.conditions
    }

    /// Activity of both slots, in slot order.
    pub fn activity(&self) -> [bool; CONDITION_SLOTS] {
        [self.conditions[0].is_active(), self.conditions[1].is_active()]
    }

    /// Current settings, rebuilt from the live record.
    pub fn settings(&self) -> SensorSettings {
        SensorSettings {
            enabled: self.enabled,
            conditions: [self.conditions[0].settings, self.conditions[1].settings],
        }
    }

    /// Apply one validated setting change.
    pub fn apply_setting(&mut self, change: SettingChange) -> core::result::Result<(), SettingsError> {
        let mut settings = self.settings();
        settings.apply(change)?;

        if settings.enabled != self.enabled {
            info!(
                "Temperature relay function for sensor {}: {}",
                self.id,
                if settings.enabled { "Enabled" } else { "Disabled" }
            );
        }
        self.enabled = settings.enabled;
        for (c, s) in self.conditions.iter_mut().zip(settings.conditions) {
            c.settings = s;
        }
        Ok(())
    }

    /// Feed this tick's reading and re-derive both conditions.
    ///
    /// Non-finite readings count as failed reads.
    pub fn tick(&mut self, reading: Option<f32>, log_every: u32) -> Result<TrackOutcome> {
        let reading = reading.filter(|t| t.is_finite());
        self.temperature = reading;

        let decision = self.retry.classify(reading.is_some());
        match self.retry_notice(decision, log_every) {
            Some(RetryNotice::Recovered) => info!(
                "Value of sensor {} temperature is valid again, resuming evaluation",
                self.id
            ),
            Some(RetryNotice::Retrying { attempt, limit }) => info!(
                "Error reading sensor {} temperature, retrying... [{} / {}]",
                self.id, attempt, limit
            ),
            Some(RetryNotice::Exhausted { attempts }) => warn!(
                "Error reading sensor {} temperature after {} attempts. \
                 Disabling relay driving for its conditions.",
                self.id, attempts
            ),
            None => {}
        }

        condition::track(
            &self.id,
            &mut self.conditions,
            self.enabled,
            decision.action,
            reading,
        )
    }

    /// The retry event worth logging for `decision`, if any. Always `None`
    /// while the sensor is disabled.
    fn retry_notice(&self, decision: RetryDecision, log_every: u32) -> Option<RetryNotice> {
        if !self.enabled {
            return None;
        }
        let limit = self.retry.limit();
        match decision.action {
            RetryAction::Proceed if decision.recovered() => Some(RetryNotice::Recovered),
            RetryAction::Freeze
                if decision.failed_reads < limit
                    && decision.failed_reads % log_every.max(1) == 0 =>
            {
                Some(RetryNotice::Retrying {
                    attempt: decision.failed_reads,
                    limit,
                })
            }
            RetryAction::Release => Some(RetryNotice::Exhausted {
                attempts: decision.failed_reads,
            }),
            _ => None,
        }
    }

    /// Drop condition bookkeeping that points at `relay`.
    pub fn forget_relay(&mut self, relay: RelayId) -> usize {
        self.conditions
            .iter_mut()
            .map(|c| c.forget_relay(relay))
            .filter(|forgot| *forgot)
            .count()
    }
}

// ───────────────────────────────────────────────────────────────
// SensorTable
// ───────────────────────────────────────────────────────────────

/// Sensor id → live record. Iteration is in id order.
#[derive(Debug, Clone, Default)]
pub struct SensorTable {
    sensors: BTreeMap<SensorId, Sensor>,
}

impl SensorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sensor. Returns `false` (and keeps the old record) if the
    /// id is already tracked.
    pub fn insert(&mut self, sensor: Sensor) -> bool {
        if self.sensors.contains_key(sensor.id()) {
            return false;
        }
        self.sensors.insert(sensor.id().clone(), sensor);
        true
    }

    pub fn remove(&mut self, id: &SensorId) -> Option<Sensor> {
        self.sensors.remove(id)
    }

    pub fn get(&self, id: &SensorId) -> Option<&Sensor> {
        self.sensors.get(id)
    }

    pub fn get_mut(&mut self, id: &SensorId) -> Option<&mut Sensor> {
        self.sensors.get_mut(id)
    }

    pub fn contains(&self, id: &SensorId) -> bool {
        self.sensors.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Sensor> {
        self.sensors.values_mut()
    }

    pub fn ids(&self) -> Vec<SensorId> {
        self.sensors.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Drop every record, returning the ids that were tracked.
    pub fn clear(&mut self) -> Vec<SensorId> {
        let ids = self.ids();
        self.sensors.clear();
        ids
    }

    /// Drop every condition bookkeeping entry pointing at `relay`.
    pub fn forget_relay(&mut self, relay: RelayId) -> usize {
        self.sensors.values_mut().map(|s| s.forget_relay(relay)).sum()
    }
}
