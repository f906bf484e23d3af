//! JSON snapshot bus adapter.
//!
//! Implements [`BusPort`] and [`ServicePort`] against two files, which is
//! enough to run the controller on a bench or behind a bridge process that
//! mirrors the real bus:
//!
//! | File          | Owner       | Content                                    |
//! |---------------|-------------|--------------------------------------------|
//! | bus snapshot  | bridge      | relay state + function, sensor temperatures |
//! | service file  | controller  | flat `/Sensor/<id>/...` path → value map    |
//!
//! Bus snapshot format:
//!
//! ```json
//! { "relays":  [ { "state": false, "function": 4 }, { "state": false, "function": 0 } ],
//!   "sensors": { "com.victronenergy.temperature.adc_builtin0_6": 21.5,
//!                "ruuvi_c66a72222d16": null } }
//! ```
//!
//! `null` is a failed read. [`FileBus::refresh`] re-reads the snapshot and
//! turns the difference into device add/remove and relay-function
//! notifications. Relay commands are written back into the snapshot.
//!
//! The service file is also an input. While the service is registered,
//! edits another process makes to `/Mode`, `/Sensor/<id>/Enabled` or
//! `/Sensor/<id>/<slot>/{Relay,SetValue,ClearValue}` come back from
//! `refresh` as commands. Edits to any other path are overwritten.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::app::commands::AppCommand;
use crate::app::ports::{BusError, BusPort, ServicePort};
use crate::config::{CONDITION_SLOTS, ControlMode, SensorSettings, SettingChange};
use crate::relays::{RELAY_COUNT, RelayId};
use crate::sensors::SensorId;

/// Prefix of temperature sensor service names on the bus.
pub const TEMPERATURE_SERVICE_PREFIX: &str = "com.victronenergy.temperature.";

/// Name the controller registers its own service under.
pub const SERVICE_NAME: &str = "com.victronenergy.temprelay";

/// Reduce a sensor service name to its id; bare ids pass through.
pub fn strip_service_prefix(name: &str) -> &str {
    name.strip_prefix(TEMPERATURE_SERVICE_PREFIX).unwrap_or(name)
}

/// Full service name of a sensor id.
pub fn service_name(id: &SensorId) -> String {
    format!("{TEMPERATURE_SERVICE_PREFIX}{id}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct RelaySnapshot {
    state: Option<bool>,
    function: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct BusSnapshot {
    relays: Vec<RelaySnapshot>,
    sensors: BTreeMap<String, Option<f32>>,
}

/// The part of the service file read back for external writes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceDocument {
    paths: BTreeMap<String, Value>,
}

/// The snapshot with ids normalised and relays indexed.
#[derive(Debug, Clone, Default, PartialEq)]
struct BusView {
    relays: [RelaySnapshot; RELAY_COUNT],
    temperatures: BTreeMap<SensorId, Option<f32>>,
}

impl From<&BusSnapshot> for BusView {
    fn from(snap: &BusSnapshot) -> Self {
        let mut view = BusView::default();
        for (slot, relay) in view.relays.iter_mut().zip(&snap.relays) {
            *slot = *relay;
        }
        for (name, temp) in &snap.sensors {
            match SensorId::new(strip_service_prefix(name)) {
                Ok(id) => {
                    view.temperatures.insert(id, *temp);
                }
                Err(e) => warn!("FileBus: skipping sensor {name:?}: {e}"),
            }
        }
        view
    }
}

/// File-backed bus client plus the controller's published service.
#[derive(Debug)]
pub struct FileBus {
    bus_path: PathBuf,
    /// `None` keeps the service in memory only.
    service_path: Option<PathBuf>,
    view: BusView,
    registered: bool,
    paths: BTreeMap<String, Value>,
}

impl FileBus {
    /// Open the bus snapshot. Its current content is the baseline for
    /// [`refresh`](Self::refresh); a missing file is an empty bus.
    pub fn open(bus_path: impl Into<PathBuf>, service_path: Option<PathBuf>) -> Result<Self, BusError> {
        let bus_path = bus_path.into();
        let view = read_snapshot(&bus_path)?
            .map(|s| BusView::from(&s))
            .unwrap_or_default();
        info!(
            "FileBus: {} relays, {} sensors in {}",
            view.relays.iter().filter(|r| r.function.is_some()).count(),
            view.temperatures.len(),
            bus_path.display()
        );
        Ok(Self {
            bus_path,
            service_path,
            view,
            registered: false,
            paths: BTreeMap::new(),
        })
    }

    /// Re-read the snapshot and report what changed.
    pub fn refresh(&mut self) -> Result<Vec<AppCommand>, BusError> {
        let fresh = match read_snapshot(&self.bus_path)? {
            Some(snap) => BusView::from(&snap),
            None => BusView::default(),
        };

        let mut commands = Vec::new();
        for relay in RelayId::ALL {
            let (old, new) = (
                self.view.relays[relay.index()].function,
                fresh.relays[relay.index()].function,
            );
            if old != new {
                commands.push(AppCommand::RelayFunctionChanged { relay, code: new });
            }
        }
        for id in self.view.temperatures.keys() {
            if !fresh.temperatures.contains_key(id) {
                commands.push(AppCommand::DeviceRemoved(id.clone()));
            }
        }
        for id in fresh.temperatures.keys() {
            if !self.view.temperatures.contains_key(id) {
                commands.push(AppCommand::DeviceAdded(id.clone()));
            }
        }

        self.view = fresh;
        commands.extend(self.service_writes());
        Ok(commands)
    }

    /// Diff the service file against what was last published. Writable
    /// paths holding a well-formed value become commands; every other
    /// difference is reverted.
    fn service_writes(&mut self) -> Vec<AppCommand> {
        let Some(path) = self.service_path.as_deref().filter(|_| self.registered) else {
            return Vec::new();
        };
        let doc: ServiceDocument = match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("FileBus: service file {} unreadable, rewriting: {e}", path.display());
                    self.flush_service();
                    return Vec::new();
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.flush_service();
                return Vec::new();
            }
            Err(e) => {
                warn!("FileBus: read {} failed: {e}", path.display());
                return Vec::new();
            }
        };

        let mut commands = Vec::new();
        let mut revert = doc.paths.keys().any(|p| !self.paths.contains_key(p));
        let published: Vec<String> = self.paths.keys().cloned().collect();
        for key in published {
            match doc.paths.get(&key) {
                Some(value) if Some(value) == self.paths.get(&key) => {}
                Some(value) => match parse_write(&key, value) {
                    Some(cmd) => {
                        debug!("FileBus: external write {key} = {value}");
                        self.paths.insert(key, value.clone());
                        commands.push(cmd);
                    }
                    None => {
                        warn!("FileBus: rejecting write {key} = {value}");
                        revert = true;
                    }
                },
                None => revert = true,
            }
        }
        if revert {
            self.flush_service();
        }
        commands
    }

    /// Value at a service path, e.g. `/Sensor/adc_builtin0_6/0/State`.
    pub fn service_value(&self, path: &str) -> Option<&Value> {
        self.paths.get(path)
    }

    fn set_path(&mut self, path: String, value: Value) -> bool {
        self.paths.insert(path, value.clone()).as_ref() != Some(&value)
    }

    fn flush_service(&self) {
        let Some(path) = &self.service_path else {
            return;
        };
        let doc = json!({
            "service": SERVICE_NAME,
            "registered": self.registered,
            "paths": self.paths,
        });
        if let Err(e) = write_atomic(path, &doc) {
            warn!("FileBus: service file {} not written: {e}", path.display());
        }
    }
}

fn read_snapshot(path: &Path) -> Result<Option<BusSnapshot>, BusError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            warn!("FileBus: read {} failed: {e}", path.display());
            return Err(BusError::Io);
        }
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        warn!("FileBus: {} is not a bus snapshot: {e}", path.display());
        BusError::Io
    })
}

fn write_atomic(path: &Path, value: &impl Serialize) -> Result<(), BusError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|_| BusError::Io)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|_| BusError::Io)?;
    fs::rename(&tmp, path).map_err(|_| BusError::Io)
}

impl BusPort for FileBus {
    fn relay_state(&self, relay: RelayId) -> Option<bool> {
        self.view.relays[relay.index()].state
    }

    fn relay_function(&self, relay: RelayId) -> Option<i32> {
        self.view.relays[relay.index()].function
    }

    fn temperature(&self, sensor: &SensorId) -> Option<f32> {
        self.view.temperatures.get(sensor).copied().flatten()
    }

    fn temperature_sensors(&self) -> Vec<SensorId> {
        self.view.temperatures.keys().cloned().collect()
    }

    fn set_relay_state(&mut self, relay: RelayId, active: bool) -> Result<(), BusError> {
        // Read-modify-write so edits made by the bridge since the last
        // refresh survive.
        let mut snap = read_snapshot(&self.bus_path)?.ok_or(BusError::NotFound)?;
        let record = snap
            .relays
            .get_mut(relay.index())
            .ok_or(BusError::NotFound)?;
        record.state = Some(active);
        write_atomic(&self.bus_path, &snap)?;
        self.view.relays[relay.index()].state = Some(active);
        Ok(())
    }
}

impl ServicePort for FileBus {
    fn register(&mut self) {
        info!("FileBus: registering {SERVICE_NAME}");
        self.registered = true;
        self.paths.clear();
        self.paths.insert("/State".to_owned(), json!(0));
        self.flush_service();
    }

    fn unregister(&mut self) {
        info!("FileBus: unregistering {SERVICE_NAME}");
        self.registered = false;
        self.paths.clear();
        self.flush_service();
    }

    fn is_registered(&self) -> bool {
        self.registered
    }

    fn publish_sensor(&mut self, sensor: &SensorId, settings: &SensorSettings) {
        let prefix = format!("/Sensor/{sensor}");
        let mut changed = self.set_path(format!("{prefix}/Enabled"), json!(u8::from(settings.enabled)));
        changed |= self.set_path(format!("{prefix}/ServiceName"), json!(service_name(sensor)));
        for (slot, c) in settings.conditions.iter().enumerate() {
            changed |= self.set_path(format!("{prefix}/{slot}/Relay"), json!(c.relay));
            changed |= self.set_path(format!("{prefix}/{slot}/SetValue"), json!(c.set_value));
            changed |= self.set_path(format!("{prefix}/{slot}/ClearValue"), json!(c.clear_value));
        }
        if changed {
            self.flush_service();
        }
    }

    fn withdraw_sensor(&mut self, sensor: &SensorId) {
        let prefix = format!("/Sensor/{sensor}/");
        let before = self.paths.len();
        self.paths.retain(|p, _| !p.starts_with(&prefix));
        if self.paths.len() != before {
            debug!("FileBus: withdrew {}", sensor);
            self.flush_service();
        }
    }

    fn publish_condition_state(&mut self, sensor: &SensorId, slot: usize, active: bool) {
        debug_assert!(slot < CONDITION_SLOTS);
        if self.set_path(format!("/Sensor/{sensor}/{slot}/State"), json!(u8::from(active))) {
            self.flush_service();
        }
    }

    fn publish_mode(&mut self, mode: ControlMode) {
        if self.set_path("/Mode".to_owned(), json!(u8::from(mode))) {
            self.flush_service();
        }
    }

    fn publish_available_sensors(&mut self, sensors: &[SensorId]) {
        let names: Vec<String> = sensors.iter().map(service_name).collect();
        if self.set_path("/AvailableTemperatureServices".to_owned(), json!(names)) {
            self.flush_service();
        }
    }
}

/// Map a write to a published path onto the command it stands for.
/// `None` for read-only paths and for values of the wrong shape; range
/// checks are left to the engine.
fn parse_write(path: &str, value: &Value) -> Option<AppCommand> {
    if path == "/Mode" {
        let raw = u8::try_from(value.as_u64()?).ok()?;
        return ControlMode::try_from(raw).ok().map(AppCommand::SetMode);
    }

    let rest = path.strip_prefix("/Sensor/")?;
    let (sensor, field) = rest.split_once('/')?;
    let sensor = SensorId::new(sensor).ok()?;
    let change = match field.split_once('/') {
        None if field == "Enabled" => SettingChange::Enabled(match value {
            Value::Bool(on) => *on,
            v => v.as_i64()? != 0,
        }),
        None => return None,
        Some((slot, name)) => {
            let slot: usize = slot.parse().ok().filter(|s| *s < CONDITION_SLOTS)?;
            match name {
                "Relay" => SettingChange::Relay {
                    slot,
                    relay: i32::try_from(value.as_i64()?).ok()?,
                },
                "SetValue" => SettingChange::SetValue {
                    slot,
                    value: value.as_f64()? as f32,
                },
                "ClearValue" => SettingChange::ClearValue {
                    slot,
                    value: value.as_f64()? as f32,
                },
                _ => return None,
            }
        }
    };
    Some(AppCommand::SettingChanged { sensor, change })
}
