//! Relay configuration guard.
//!
//! Tracks which relays are currently handed to temperature control. The
//! guard is re-evaluated whenever a relay's function setting changes and
//! keeps the result in a bitmask, one bit per [`RelayId`].
//!
//! ## Transition lifecycle
//!
//! 1. A relay's function becomes the temperature-control code → its bit is
//!    set and the arbiter may drive it from the next tick on.
//! 2. The function changes to anything else → its bit is cleared. The
//!    caller deactivates the relay once if it was on and drops every
//!    condition bookkeeping entry pointing at it.
//! 3. The engine is *needed* while at least one bit is set. Losing the last
//!    bit tears down all sensor state; gaining the first rebuilds it.
//!
//! The first observation of a relay never produces a deactivation: a relay
//! that was never ours is never touched.

use log::info;

use super::{RelayFunction, RelayId};

/// Edge reported by [`RelayConfigGuard::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardTransition {
    Configured,
    Unconfigured,
}

/// Per-relay `Configured` / `Unconfigured` state machine.
#[derive(Debug, Clone, Default)]
pub struct RelayConfigGuard {
    /// Bitmask of configured relays.
    configured: u8,
}

impl RelayConfigGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the relay's current function. Returns the edge, if any.
    pub fn update(&mut self, relay: RelayId, function: RelayFunction) -> Option<GuardTransition> {
        let was = self.is_configured(relay);
        let now = function == RelayFunction::TemperatureControl;

        match (was, now) {
            (false, true) => {
                self.configured |= relay.mask();
                info!("RelayGuard: {relay} configured for temperature control");
                Some(GuardTransition::Configured)
            }
            (true, false) => {
                self.configured &= !relay.mask();
                info!("RelayGuard: {relay} no longer configured for temperature control");
                Some(GuardTransition::Unconfigured)
            }
            _ => None,
        }
    }

    pub fn is_configured(&self, relay: RelayId) -> bool {
        self.configured & relay.mask() != 0
    }

    /// True if **any** relay is configured, i.e. the engine is needed.
    pub fn any_configured(&self) -> bool {
        self.configured != 0
    }

    /// Current bitmask (bit n = relay n).
    pub fn configured_mask(&self) -> u8 {
        self.configured
    }
}
