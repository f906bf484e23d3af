//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the sensor table, the relay bank and the relay
//! configuration guard. It exposes a clean, transport-agnostic API. All
//! I/O flows through port traits injected at call sites, making the
//! entire service testable with mock adapters.
//!
//! ```text
//!     BusPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          AppService          │
//! ServicePort ◀── │ Retry · Tracker · Arbiter    │ ◀── SettingsPort
//!                 └──────────────────────────────┘
//! ```
//!
//! Notifications ([`AppCommand`]) are applied one at a time between ticks,
//! so a tick always sees either none or all of a change.

use log::{debug, error, info, warn};

use crate::config::{
    CONDITION_SLOTS, ControlMode, SensorSettings, SettingChange, SystemConfig,
    validate_sensor_settings,
};
use crate::diagnostics::RuntimeMetrics;
use crate::error::Result;
use crate::relays::arbiter::{self, SwitchOutcome};
use crate::relays::guard::{GuardTransition, RelayConfigGuard};
use crate::relays::{RelayBank, RelayFunction, RelayId};
use crate::sensors::condition::TrackState;
use crate::sensors::{Sensor, SensorId, SensorTable};

use super::commands::AppCommand;
use super::events::{AppEvent, StatusSnapshot};
use super::ports::{BusPort, EventSink, ServicePort, SettingsPort};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Sensors whose conditions went through the comparator.
    pub evaluated: usize,
    /// Relay commands written, including rejected ones.
    pub commands_issued: usize,
    pub write_failures: usize,
    /// Sensors whose retry grace period ran out this tick.
    pub released: usize,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: SystemConfig,
    sensors: SensorTable,
    bank: RelayBank,
    guard: RelayConfigGuard,
    /// True while at least one relay is configured and the service object
    /// is registered.
    active: bool,
    tick_count: u64,
    metrics: RuntimeMetrics,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** look at the bus; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            sensors: SensorTable::new(),
            bank: RelayBank::new(),
            guard: RelayConfigGuard::new(),
            active: false,
            tick_count: 0,
            metrics: RuntimeMetrics::default(),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Read every relay's function, seed the configuration guard and
    /// activate if any relay is ours.
    pub fn start(
        &mut self,
        io: &mut (impl BusPort + ServicePort),
        settings: &impl SettingsPort,
        sink: &mut impl EventSink,
    ) {
        for relay in RelayId::ALL {
            let function =
                RelayFunction::from_code(io.relay_function(relay), self.config.temperature_function_code);
            self.bank.get_mut(relay).observed = io.relay_state(relay).unwrap_or(false);
            // Nothing is configured yet, so no edge here can be a release.
            let _ = self.guard.update(relay, function);
        }
        info!(
            "AppService started, configured relays 0b{:02b}",
            self.guard.configured_mask()
        );
        self.evaluate_needed(io, settings, sink);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one evaluation cycle: retry guard → condition tracker →
    /// relay arbiter → commands for configured relays.
    ///
    /// The `io` parameter satisfies **both** [`BusPort`] and
    /// [`ServicePort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    ///
    /// An `Err` is an internal fault; in-memory state can no longer be
    /// trusted and the caller should stop.
    pub fn tick(
        &mut self,
        io: &mut (impl BusPort + ServicePort),
        sink: &mut impl EventSink,
    ) -> Result<TickSummary> {
        self.tick_count += 1;
        self.metrics.record_tick();

        let mut summary = TickSummary::default();
        if !self.active {
            return Ok(summary);
        }

        // 1. Retry guard + condition tracker, per sensor
        let log_every = self.config.retry_log_every;
        for sensor in self.sensors.iter_mut() {
            let reading = io.temperature(sensor.id());
            let outcome = match sensor.tick(reading, log_every) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Tick aborted at sensor {}: {}", sensor.id(), e);
                    return Err(e);
                }
            };

            match outcome.state {
                TrackState::Evaluated => summary.evaluated += 1,
                TrackState::Released => {
                    summary.released += 1;
                    self.metrics.record_release();
                    sink.emit(&AppEvent::SensorExhausted(sensor.id().clone()));
                }
                TrackState::Disabled | TrackState::Frozen => {}
            }

            // 2. Publish every slot, announce the ones that moved
            for (slot, active) in sensor.activity().into_iter().enumerate() {
                io.publish_condition_state(sensor.id(), slot, active);
                if outcome.changed[slot] {
                    sink.emit(&AppEvent::ConditionChanged {
                        sensor: sensor.id().clone(),
                        slot,
                        active,
                    });
                }
            }
        }

        // 3. Arbitration and relay commands
        let report = arbiter::apply(&mut self.bank, &self.guard, self.sensors.iter(), io);
        for relay in RelayId::ALL {
            match report[relay.index()] {
                Some(SwitchOutcome::Switched) => {
                    summary.commands_issued += 1;
                    self.metrics.record_command(true);
                    sink.emit(&AppEvent::RelaySwitched {
                        relay,
                        active: self.bank.get(relay).desired,
                    });
                }
                Some(SwitchOutcome::Failed(_)) => {
                    summary.commands_issued += 1;
                    summary.write_failures += 1;
                    self.metrics.record_command(false);
                    sink.emit(&AppEvent::RelayWriteFailed(relay));
                }
                Some(SwitchOutcome::Unchanged) | None => {}
            }
        }

        Ok(summary)
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one notification from the bus or the settings store.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        io: &mut (impl BusPort + ServicePort),
        settings: &mut impl SettingsPort,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::RelayFunctionChanged { relay, code } => {
                let function =
                    RelayFunction::from_code(code, self.config.temperature_function_code);
                match code {
                    Some(c) => info!("Function of {relay} changed to {c}"),
                    None => info!("Function of {relay} is no longer readable"),
                }
                if self.guard.update(relay, function) == Some(GuardTransition::Unconfigured) {
                    self.release_relay(relay, io, sink);
                }
                self.evaluate_needed(io, &*settings, sink);
            }
            AppCommand::DeviceAdded(id) => {
                if self.active {
                    self.add_sensor(id, false, io, &*settings, sink);
                } else {
                    debug!("Sensor {id} appeared while dormant, ignoring");
                }
                self.evaluate_needed(io, &*settings, sink);
            }
            AppCommand::DeviceRemoved(id) => {
                if self.sensors.remove(&id).is_some() {
                    io.withdraw_sensor(&id);
                    io.publish_available_sensors(&self.sensors.ids());
                    info!("Sensor {id} removed");
                    sink.emit(&AppEvent::SensorRemoved(id));
                }
                self.evaluate_needed(io, &*settings, sink);
            }
            AppCommand::SettingChanged { sensor, change } => {
                self.apply_setting(sensor, change, io, settings, sink);
            }
            AppCommand::SetMode(mode) => self.set_mode(mode, io, settings),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a status snapshot from the current state.
    pub fn build_status(&self) -> StatusSnapshot {
        StatusSnapshot {
            active: self.active,
            mode: self.config.mode,
            tick_count: self.tick_count,
            sensor_count: self.sensors.len(),
            enabled_sensors: self.sensors.iter().filter(|s| s.is_enabled()).count(),
            configured_relays: self.guard.configured_mask(),
            desired_relays: self.bank.desired(),
        }
    }

    /// Whether the engine currently controls any relay.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mode(&self) -> ControlMode {
        self.config.mode
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn sensor(&self, id: &SensorId) -> Option<&Sensor> {
        self.sensors.get(id)
    }

    pub fn sensors(&self) -> &SensorTable {
        &self.sensors
    }

    pub fn relays(&self) -> &RelayBank {
        &self.bank
    }

    pub fn guard(&self) -> &RelayConfigGuard {
        &self.guard
    }

    /// Total ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        self.metrics
    }

    // ── Internal ──────────────────────────────────────────────

    /// Toggle between active and dormant when the "needed" bit moved.
    fn evaluate_needed(
        &mut self,
        io: &mut (impl BusPort + ServicePort),
        settings: &impl SettingsPort,
        sink: &mut impl EventSink,
    ) {
        match (self.guard.any_configured(), self.active) {
            (true, false) => self.activate(io, settings, sink),
            (false, true) => self.deactivate(io, sink),
            _ => {}
        }
    }

    fn activate(
        &mut self,
        io: &mut (impl BusPort + ServicePort),
        settings: &impl SettingsPort,
        sink: &mut impl EventSink,
    ) {
        info!("Relay function set to temperature control, taking control of the relays");
        self.active = true;
        self.metrics.record_activation();
        if !io.is_registered() {
            io.register();
        }
        io.publish_mode(self.config.mode);
        io.publish_available_sensors(&[]);
        sink.emit(&AppEvent::Activated);

        for id in io.temperature_sensors() {
            self.add_sensor(id, false, io, settings, sink);
        }
    }

    fn deactivate(&mut self, io: &mut impl ServicePort, sink: &mut impl EventSink) {
        info!("No relay configured for temperature control, going dormant");
        for id in self.sensors.clear() {
            io.withdraw_sensor(&id);
            sink.emit(&AppEvent::SensorRemoved(id));
        }
        if io.is_registered() {
            io.unregister();
        }
        for relay in RelayId::ALL {
            self.bank.get_mut(relay).desired = false;
        }
        self.active = false;
        sink.emit(&AppEvent::Deactivated);
    }

    /// Start tracking a sensor with its stored settings.
    fn add_sensor(
        &mut self,
        id: SensorId,
        force_enable: bool,
        io: &mut impl ServicePort,
        settings: &impl SettingsPort,
        sink: &mut impl EventSink,
    ) {
        if self.sensors.contains(&id) {
            return;
        }

        let mut stored = match settings.load_sensor(&id) {
            Ok(s) => s,
            Err(e) => {
                warn!("Settings for sensor {id} unavailable ({e}), using defaults");
                SensorSettings::default()
            }
        };
        if let Err(e) = validate_sensor_settings(&stored) {
            warn!("Stored settings for sensor {id} rejected ({e}), using defaults");
            stored = SensorSettings::default();
        }
        stored.enabled |= force_enable;

        io.publish_sensor(&id, &stored);
        for slot in 0..CONDITION_SLOTS {
            io.publish_condition_state(&id, slot, false);
        }
        info!("Sensor {id} added");
        sink.emit(&AppEvent::SensorAdded(id.clone()));
        self.sensors
            .insert(Sensor::new(id, stored, self.config.retry_limit));
        io.publish_available_sensors(&self.sensors.ids());
    }

    /// Deconfiguration of one relay: switch it off once if it is on and
    /// forget every condition assignment pointing at it.
    fn release_relay(&mut self, relay: RelayId, io: &mut impl BusPort, sink: &mut impl EventSink) {
        let record = self.bank.get_mut(relay);
        let observed = io.relay_state(relay).unwrap_or(record.observed);
        record.desired = false;

        if observed {
            let accepted = match io.set_relay_state(relay, false) {
                Ok(()) => {
                    info!("Switching {relay}: Deactivated");
                    record.observed = false;
                    sink.emit(&AppEvent::RelaySwitched {
                        relay,
                        active: false,
                    });
                    true
                }
                Err(e) => {
                    warn!("Error releasing {relay}: {e}");
                    sink.emit(&AppEvent::RelayWriteFailed(relay));
                    false
                }
            };
            self.metrics.record_command(accepted);
        }

        let dropped = self.sensors.forget_relay(relay);
        debug!("Dropped {dropped} condition assignment(s) to {relay}");
    }

    /// Apply a setting change from the store or from a write to the
    /// published service. Accepted changes are persisted; a rejected one
    /// republishes the values still in effect.
    fn apply_setting(
        &mut self,
        id: SensorId,
        change: SettingChange,
        io: &mut impl ServicePort,
        settings: &mut impl SettingsPort,
        sink: &mut impl EventSink,
    ) {
        if !self.active {
            debug!("Setting change for sensor {id} while dormant, ignoring");
            return;
        }

        match self.sensors.get_mut(&id) {
            Some(sensor) => {
                match sensor.apply_setting(change) {
                    Ok(()) => persist_setting(&id, change, settings),
                    Err(e) => warn!("Ignoring setting change for sensor {id}: {e}"),
                }
                io.publish_sensor(&id, &sensor.settings());
            }
            None if change == SettingChange::Enabled(true) => {
                persist_setting(&id, change, settings);
                self.add_sensor(id, true, io, &*settings, sink);
            }
            None => debug!("Setting change for unknown sensor {id}, ignoring"),
        }
    }

    fn set_mode(
        &mut self,
        mode: ControlMode,
        io: &mut impl ServicePort,
        settings: &mut impl SettingsPort,
    ) {
        if mode != self.config.mode {
            info!("Mode changed to {mode:?}");
            self.config.mode = mode;
        }
        persist_mode(mode, settings);
        if self.active {
            io.publish_mode(mode);
        }
    }
}

/// Patch one field of the stored sensor record. Nothing is written when
/// the store already holds the value, which is the case for changes that
/// originate in the store itself.
fn persist_setting(id: &SensorId, change: SettingChange, settings: &mut impl SettingsPort) {
    let mut stored = match settings.load_sensor(id) {
        Ok(s) => s,
        Err(e) => {
            warn!("Setting for sensor {id} not persisted: {e}");
            return;
        }
    };
    let before = stored;
    if stored.apply(change).is_err() || stored == before {
        return;
    }
    if let Err(e) = settings.save_sensor(id, &stored) {
        warn!("Setting for sensor {id} not persisted: {e}");
    }
}

/// Patch only the mode of the stored configuration, leaving every other
/// stored field as it is on disk.
fn persist_mode(mode: ControlMode, settings: &mut impl SettingsPort) {
    let mut stored = match settings.load_config() {
        Ok(c) => c,
        Err(e) => {
            warn!("Mode not persisted: {e}");
            return;
        }
    };
    if stored.mode == mode {
        return;
    }
    stored.mode = mode;
    if let Err(e) = settings.save_config(&stored) {
        warn!("Mode not persisted: {e}");
    }
}
