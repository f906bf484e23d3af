//! Two-threshold hysteresis comparator
//!
//! Decides whether a condition is active from its set/clear thresholds, the
//! current reading, and the previous activity. The direction is implied by
//! the threshold order:
//!
//! ```text
//!  Rising  (set > clear):   active at value >= set, stays active while value > clear
//!  Falling (set <= clear):  active at value <= set, stays active while value < clear
//! ```
//!
//! Equality at the set threshold always (re)activates; equality at the
//! clear threshold always deactivates.

/// Direction in which a condition triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Activates when the value climbs to the set threshold.
    Rising,
    /// Activates when the value drops to the set threshold.
    Falling,
}

impl TriggerMode {
    pub fn of(setpoint: f32, clearpoint: f32) -> Self {
        if setpoint > clearpoint {
            Self::Rising
        } else {
            Self::Falling
        }
    }
}

/// Evaluate one condition. An absent value is never active.
pub fn evaluate(setpoint: f32, clearpoint: f32, value: Option<f32>, was_active: bool) -> bool {
    let Some(value) = value else {
        return false;
    };

    match TriggerMode::of(setpoint, clearpoint) {
        TriggerMode::Rising => value >= setpoint || (was_active && value > clearpoint),
        TriggerMode::Falling => value <= setpoint || (was_active && value < clearpoint),
    }
}
