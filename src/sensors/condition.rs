//! Condition slots and the condition tracker.
//!
//! Each sensor owns two independent [`Condition`]s. Once per tick the
//! tracker derives their activity from the sensor's enable flag, the retry
//! guard's decision and the hysteresis comparator:
//!
//! | Situation          | Effect on both slots                         |
//! |--------------------|----------------------------------------------|
//! | sensor disabled    | forced `false`, no threshold evaluation      |
//! | `Freeze`           | unchanged from last tick                     |
//! | `Release`          | forced `false`                               |
//! | `Proceed`          | assigned slot → comparator; unassigned → `false` |
//!
//! A condition's own activity reflects only sensor and threshold state. It
//! is not cleared because its relay is unconfigured; the arbiter decides
//! whether the relay is actually driven.

use log::info;

use crate::config::{CONDITION_SLOTS, ConditionSettings};
use crate::control::hysteresis;
use crate::control::retry::RetryAction;
use crate::error::{Error, Result};
use crate::relays::RelayId;

use super::SensorId;

/// One hysteresis rule of a sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub settings: ConditionSettings,
    active: bool,
    /// Relay this slot last reported its activity to.
    reported_relay: Option<RelayId>,
    /// Assignment last announced in the log. Survives `forget_relay`.
    announced_relay: Option<RelayId>,
}

impl Condition {
    pub fn new(settings: ConditionSettings) -> Self {
        Self {
            settings,
            active: false,
            reported_relay: settings.relay_id(),
            announced_relay: settings.relay_id(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reported_relay(&self) -> Option<RelayId> {
        self.reported_relay
    }

    /// Re-read the assignment from the settings.
    /// Returns the new relay if the user changed it since the last call.
    fn refresh_assignment(&mut self) -> Option<Option<RelayId>> {
        let current = self.settings.relay_id();
        self.reported_relay = current;
        if current == self.announced_relay {
            return None;
        }
        self.announced_relay = current;
        Some(current)
    }

    /// Drop the bookkeeping entry if it points at `relay`.
    pub fn forget_relay(&mut self, relay: RelayId) -> bool {
        if self.reported_relay == Some(relay) {
            self.reported_relay = None;
            true
        } else {
            false
        }
    }

    /// Set activity, returning whether it changed.
    fn set_active(&mut self, active: bool) -> bool {
        let changed = self.active != active;
        self.active = active;
        changed
    }

    /// Run the comparator for this slot.
    fn evaluate(&mut self, reading: Option<f32>) -> Result<bool> {
        if self.settings.relay_id().is_none() {
            return Ok(self.set_active(false));
        }

        let ConditionSettings {
            set_value,
            clear_value,
            ..
        } = self.settings;
        if !set_value.is_finite() || !clear_value.is_finite() {
            return Err(Error::Internal("non-finite condition threshold"));
        }

        let next = hysteresis::evaluate(set_value, clear_value, reading, self.active);
        Ok(self.set_active(next))
    }
}

/// How the tracker treated a sensor this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Disabled,
    Frozen,
    Released,
    Evaluated,
}

/// Result of tracking one sensor for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOutcome {
    pub state: TrackState,
    /// Which slots changed activity this tick.
    pub changed: [bool; CONDITION_SLOTS],
    /// Which slots were reassigned to another relay since last tick.
    pub reassigned: [bool; CONDITION_SLOTS],
}

impl TrackOutcome {
    pub fn any_changed(&self) -> bool {
        self.changed.iter().any(|c| *c)
    }
}

/// Derive both slots' activity for one tick.
pub fn track(
    sensor: &SensorId,
    conditions: &mut [Condition; CONDITION_SLOTS],
    enabled: bool,
    action: RetryAction,
    reading: Option<f32>,
) -> Result<TrackOutcome> {
    let mut reassigned = [false; CONDITION_SLOTS];
    for (slot, c) in conditions.iter_mut().enumerate() {
        if let Some(relay) = c.refresh_assignment() {
            reassigned[slot] = true;
            match relay {
                Some(r) => info!("Sensor {sensor} condition {slot} is now driving {r}"),
                None => info!("Sensor {sensor} condition {slot} no longer drives a relay"),
            }
        }
    }

    let mut changed = [false; CONDITION_SLOTS];

    if !enabled {
        if conditions.iter().any(Condition::is_active) {
            info!("Relay driving for sensor {sensor} has been disabled, releasing relays");
        }
        for (slot, c) in conditions.iter_mut().enumerate() {
            changed[slot] = c.set_active(false);
        }
        return Ok(TrackOutcome {
            state: TrackState::Disabled,
            changed,
            reassigned,
        });
    }

    let state = match action {
        RetryAction::Freeze => TrackState::Frozen,
        RetryAction::Release => {
            for (slot, c) in conditions.iter_mut().enumerate() {
                changed[slot] = c.set_active(false);
            }
            TrackState::Released
        }
        RetryAction::Proceed => {
            for (slot, c) in conditions.iter_mut().enumerate() {
                changed[slot] = c.evaluate(reading)?;
            }
            TrackState::Evaluated
        }
    };

    Ok(TrackOutcome {
        state,
        changed,
        reassigned,
    })
}
