//! Mock bus and settings adapters for integration tests.
//!
//! Records every relay command and every published value so tests can
//! assert on the full history without a running bus.

use std::collections::BTreeMap;

use temprelay::app::commands::AppCommand;
use temprelay::app::events::AppEvent;
use temprelay::app::ports::{BusError, BusPort, EventSink, ServicePort, SettingsError, SettingsPort};
use temprelay::app::service::{AppService, TickSummary};
use temprelay::config::{ControlMode, SensorSettings, SettingChange, SystemConfig};
use temprelay::relays::{RELAY_COUNT, RelayId};
use temprelay::sensors::SensorId;

pub const TEMPERATURE_CONTROL: i32 = 4;

pub fn id(s: &str) -> SensorId {
    SensorId::new(s).unwrap()
}

// ── MockBus ───────────────────────────────────────────────────

pub struct MockBus {
    pub functions: [Option<i32>; RELAY_COUNT],
    pub states: [bool; RELAY_COUNT],
    pub temperatures: BTreeMap<SensorId, Option<f32>>,
    /// Relays whose commands the bus refuses.
    pub reject_writes: [bool; RELAY_COUNT],
    /// Every accepted or rejected relay command, in order.
    pub writes: Vec<(RelayId, bool)>,
    pub registered: bool,
    pub published_states: BTreeMap<(SensorId, usize), bool>,
    pub published_settings: BTreeMap<SensorId, SensorSettings>,
    pub mode: Option<ControlMode>,
    pub available: Vec<SensorId>,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new() -> Self {
        Self {
            functions: [Some(0), Some(1)],
            states: [false; RELAY_COUNT],
            temperatures: BTreeMap::new(),
            reject_writes: [false; RELAY_COUNT],
            writes: Vec::new(),
            registered: false,
            published_states: BTreeMap::new(),
            published_settings: BTreeMap::new(),
            mode: None,
            available: Vec::new(),
        }
    }

    pub fn relay(&self, relay: RelayId) -> bool {
        self.states[relay.index()]
    }

    pub fn writes_to(&self, relay: RelayId) -> Vec<bool> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == relay)
            .map(|(_, s)| *s)
            .collect()
    }
}

impl BusPort for MockBus {
    fn relay_state(&self, relay: RelayId) -> Option<bool> {
        Some(self.states[relay.index()])
    }

    fn relay_function(&self, relay: RelayId) -> Option<i32> {
        self.functions[relay.index()]
    }

    fn temperature(&self, sensor: &SensorId) -> Option<f32> {
        self.temperatures.get(sensor).copied().flatten()
    }

    fn temperature_sensors(&self) -> Vec<SensorId> {
        self.temperatures.keys().cloned().collect()
    }

    fn set_relay_state(&mut self, relay: RelayId, active: bool) -> Result<(), BusError> {
        self.writes.push((relay, active));
        if self.reject_writes[relay.index()] {
            return Err(BusError::WriteRejected);
        }
        self.states[relay.index()] = active;
        Ok(())
    }
}

impl ServicePort for MockBus {
    fn register(&mut self) {
        self.registered = true;
    }

    fn unregister(&mut self) {
        self.registered = false;
        self.published_states.clear();
        self.published_settings.clear();
        self.mode = None;
        self.available.clear();
    }

    fn is_registered(&self) -> bool {
        self.registered
    }

    fn publish_sensor(&mut self, sensor: &SensorId, settings: &SensorSettings) {
        self.published_settings.insert(sensor.clone(), *settings);
    }

    fn withdraw_sensor(&mut self, sensor: &SensorId) {
        self.published_settings.remove(sensor);
        self.published_states.retain(|(s, _), _| s != sensor);
    }

    fn publish_condition_state(&mut self, sensor: &SensorId, slot: usize, active: bool) {
        self.published_states.insert((sensor.clone(), slot), active);
    }

    fn publish_mode(&mut self, mode: ControlMode) {
        self.mode = Some(mode);
    }

    fn publish_available_sensors(&mut self, sensors: &[SensorId]) {
        self.available = sensors.to_vec();
    }
}

// ── MockSettings ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockSettings {
    pub config: SystemConfig,
    pub sensors: BTreeMap<SensorId, SensorSettings>,
    pub config_saves: usize,
    pub sensor_saves: usize,
}

impl SettingsPort for MockSettings {
    fn load_config(&self) -> Result<SystemConfig, SettingsError> {
        Ok(self.config.clone())
    }

    fn save_config(&mut self, config: &SystemConfig) -> Result<(), SettingsError> {
        self.config = config.clone();
        self.config_saves += 1;
        Ok(())
    }

    fn load_sensor(&self, sensor: &SensorId) -> Result<SensorSettings, SettingsError> {
        Ok(self.sensors.get(sensor).copied().unwrap_or_default())
    }

    fn save_sensor(&mut self, sensor: &SensorId, settings: &SensorSettings) -> Result<(), SettingsError> {
        self.sensors.insert(sensor.clone(), *settings);
        self.sensor_saves += 1;
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

/// The service wired to mocks, with the bus's relay 0 on "manual" and
/// relay 1 on "alarm" like a controller fresh out of the box.
pub struct Harness {
    pub app: AppService,
    pub bus: MockBus,
    pub settings: MockSettings,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Harness {
    /// One sensor `adc_builtin0_6` reading 15 °C, no relay ours.
    pub fn new() -> Self {
        let mut bus = MockBus::new();
        bus.temperatures.insert(id("adc_builtin0_6"), Some(15.0));
        let mut h = Self {
            app: AppService::new(SystemConfig::default()),
            bus,
            settings: MockSettings::default(),
            sink: RecordingSink::default(),
        };
        h.app.start(&mut h.bus, &h.settings, &mut h.sink);
        h
    }

    pub fn send(&mut self, cmd: AppCommand) {
        self.app
            .handle_command(cmd, &mut self.bus, &mut self.settings, &mut self.sink);
    }

    /// Change a relay's function on the bus and notify the service.
    pub fn set_function(&mut self, relay: RelayId, code: i32) {
        self.bus.functions[relay.index()] = Some(code);
        self.send(AppCommand::RelayFunctionChanged {
            relay,
            code: Some(code),
        });
    }

    /// Hand both relays to temperature control.
    pub fn take_both_relays(&mut self) {
        self.set_function(RelayId::Relay0, TEMPERATURE_CONTROL);
        self.set_function(RelayId::Relay1, TEMPERATURE_CONTROL);
    }

    /// Edit a stored setting and deliver the change notification.
    pub fn set_setting(&mut self, sensor: &str, change: SettingChange) {
        let sensor = id(sensor);
        let entry = self.settings.sensors.entry(sensor.clone()).or_default();
        entry.apply(change).unwrap();
        self.send(AppCommand::SettingChanged { sensor, change });
    }

    /// Deliver a write made by another process to the published service,
    /// leaving the store untouched.
    pub fn write_service(&mut self, sensor: &str, change: SettingChange) {
        self.send(AppCommand::SettingChanged {
            sensor: id(sensor),
            change,
        });
    }

    /// Configure both slots the way most scenarios do: slot 0 rising
    /// 30/25 on `relay0`, slot 1 falling 5/10 on `relay1`.
    pub fn configure_conditions(&mut self, sensor: &str, relay0: i32, relay1: i32) {
        self.set_setting(sensor, SettingChange::Relay { slot: 0, relay: relay0 });
        self.set_setting(sensor, SettingChange::SetValue { slot: 0, value: 30.0 });
        self.set_setting(sensor, SettingChange::ClearValue { slot: 0, value: 25.0 });
        self.set_setting(sensor, SettingChange::Relay { slot: 1, relay: relay1 });
        self.set_setting(sensor, SettingChange::SetValue { slot: 1, value: 5.0 });
        self.set_setting(sensor, SettingChange::ClearValue { slot: 1, value: 10.0 });
    }

    pub fn set_temperature(&mut self, sensor: &str, value: Option<f32>) {
        self.bus.temperatures.insert(id(sensor), value);
    }

    pub fn tick(&mut self) -> TickSummary {
        self.app.tick(&mut self.bus, &mut self.sink).unwrap()
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Published activity of both slots of a sensor.
    pub fn states(&self, sensor: &str) -> [Option<bool>; 2] {
        let sensor = id(sensor);
        [
            self.bus.published_states.get(&(sensor.clone(), 0)).copied(),
            self.bus.published_states.get(&(sensor, 1)).copied(),
        ]
    }

    pub fn relays(&self) -> [bool; RELAY_COUNT] {
        self.bus.states
    }
}
