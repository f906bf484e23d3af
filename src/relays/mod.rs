//! Relay subsystem: identities, records, arbitration and configuration guard.
//!
//! The controller owns the *desired* state of each relay and reads its
//! *observed* state back from the bus every tick. The relay *function*
//! (what the relay is used for) belongs to external configuration and is
//! only read here.
//!
//! ## Safety contract
//!
//! No physical command is ever issued to a relay whose function is not
//! [`RelayFunction::TemperatureControl`], except the single deactivation
//! sent on the transition away from it.

pub mod arbiter;
pub mod guard;

use core::fmt;

/// Number of physical relays on the controller.
pub const RELAY_COUNT: usize = 2;

/// One of the built-in relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RelayId {
    Relay0 = 0,
    Relay1 = 1,
}

impl RelayId {
    pub const ALL: [RelayId; RELAY_COUNT] = [RelayId::Relay0, RelayId::Relay1];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Map a stored relay setting to a relay. Unassigned (`-1`) and
    /// indexes this controller does not have both yield `None`.
    pub fn from_setting(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Relay0),
            1 => Some(Self::Relay1),
            _ => None,
        }
    }

    /// Bitmask used by the configuration guard.
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay {}", self.index())
    }
}

/// What a relay is currently used for, as reported by its function setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFunction {
    TemperatureControl,
    Other,
}

impl RelayFunction {
    /// Classify a raw function code. A missing code is never ours.
    pub fn from_code(code: Option<i32>, temperature_code: i32) -> Self {
        match code {
            Some(c) if c == temperature_code => Self::TemperatureControl,
            _ => Self::Other,
        }
    }
}

/// Controller-side record of one relay.
///
/// The function assignment is not mirrored here; the
/// [`RelayConfigGuard`](guard::RelayConfigGuard) is its only owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relay {
    pub id: RelayId,
    /// Last state read back from the bus (`false` if unreadable).
    pub observed: bool,
    /// State computed by the arbiter on the last tick.
    pub desired: bool,
}

impl Relay {
    pub const fn new(id: RelayId) -> Self {
        Self {
            id,
            observed: false,
            desired: false,
        }
    }
}

/// All relays, indexed by [`RelayId`].
#[derive(Debug, Clone)]
pub struct RelayBank {
    relays: [Relay; RELAY_COUNT],
}

impl RelayBank {
    pub fn new() -> Self {
        Self {
            relays: [Relay::new(RelayId::Relay0), Relay::new(RelayId::Relay1)],
        }
    }

    pub fn get(&self, id: RelayId) -> &Relay {
        &self.relays[id.index()]
    }

    pub fn get_mut(&mut self, id: RelayId) -> &mut Relay {
        &mut self.relays[id.index()]
    }

    /// Desired states in relay order.
    pub fn desired(&self) -> [bool; RELAY_COUNT] {
        [self.relays[0].desired, self.relays[1].desired]
    }
}

impl Default for RelayBank {
    fn default() -> Self {
        Self::new()
    }
}
