//! Relay arbiter.
//!
//! Folds the activity of every condition slot into one desired state per
//! relay: a relay should be on if **any** condition assigned to it is
//! active. The fold is recomputed from scratch every tick and carries no
//! state of its own.
//!
//! Commands are only issued for configured relays, and only when the
//! desired state differs from the state read back from the bus. Reading
//! back (instead of trusting our own last command) corrects external
//! interference within one tick.

use log::{info, warn};

use crate::app::ports::{BusError, BusPort};
use crate::sensors::Sensor;

use super::guard::RelayConfigGuard;
use super::{RELAY_COUNT, RelayBank, RelayId};

/// Logical OR of all condition activity, per relay.
pub fn desired_states<'a>(sensors: impl IntoIterator<Item = &'a Sensor>) -> [bool; RELAY_COUNT] {
    let mut desired = [false; RELAY_COUNT];
    for sensor in sensors {
        for c in sensor.conditions() {
            if let Some(relay) = c.reported_relay() {
                desired[relay.index()] |= c.is_active();
            }
        }
    }
    desired
}

/// Result of one switch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The relay already had the requested state.
    Unchanged,
    /// A command was written.
    Switched,
    /// The bus rejected the command.
    Failed(BusError),
}

/// Bring a relay to `active`, writing only if its read-back state differs.
/// An unreadable relay counts as off.
pub fn switch(bus: &mut impl BusPort, relay: RelayId, active: bool) -> SwitchOutcome {
    let observed = bus.relay_state(relay).unwrap_or(false);
    if observed == active {
        return SwitchOutcome::Unchanged;
    }

    info!(
        "Switching {relay}: {}",
        if active { "Activated" } else { "Deactivated" }
    );
    match bus.set_relay_state(relay, active) {
        Ok(()) => SwitchOutcome::Switched,
        Err(e) => {
            warn!("Error setting {relay} state: {e}");
            SwitchOutcome::Failed(e)
        }
    }
}

/// Per-relay outcome of one arbitration pass (`None`: not configured).
pub type ArbitrationReport = [Option<SwitchOutcome>; RELAY_COUNT];

/// Recompute desired states and drive every configured relay.
///
/// A rejected write on one relay does not stop the others.
pub fn apply<'a>(
    bank: &mut RelayBank,
    guard: &RelayConfigGuard,
    sensors: impl IntoIterator<Item = &'a Sensor>,
    bus: &mut impl BusPort,
) -> ArbitrationReport {
    let desired = desired_states(sensors);
    let mut report = [None; RELAY_COUNT];

    for relay in RelayId::ALL {
        let record = bank.get_mut(relay);
        record.desired = desired[relay.index()];
        if !guard.is_configured(relay) {
            record.observed = bus.relay_state(relay).unwrap_or(false);
            continue;
        }

        let outcome = switch(bus, relay, record.desired);
        record.observed = match outcome {
            SwitchOutcome::Switched => record.desired,
            _ => bus.relay_state(relay).unwrap_or(false),
        };
        report[relay.index()] = Some(outcome);
    }

    report
}
