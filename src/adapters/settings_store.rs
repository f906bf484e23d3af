//! JSON file settings store.
//!
//! Implements [`SettingsPort`] on top of one JSON document:
//!
//! ```json
//! { "config": { "retry_limit": 300, ... },
//!   "sensors": { "adc_builtin0_6": { "enabled": true, "conditions": [...] } } }
//! ```
//!
//! - Validation: every field is range-checked before it is persisted.
//! - Atomic writes: the document is written to a sibling temp file and
//!   renamed over the original.
//! - A missing file means defaults; it is created on the first save.
//!
//! The file may be edited by other processes. [`JsonSettingsStore::reload`]
//! re-reads it and turns the difference into [`AppCommand`]s, which is how
//! setting-change notifications reach the engine.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::commands::AppCommand;
use crate::app::ports::{SettingsError, SettingsPort};
use crate::config::{SensorSettings, SystemConfig, validate_config, validate_sensor_settings};
use crate::sensors::SensorId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct SettingsDocument {
    config: SystemConfig,
    sensors: BTreeMap<String, SensorSettings>,
}

/// File-backed (or purely in-memory) settings store.
#[derive(Debug, Default)]
pub struct JsonSettingsStore {
    /// `None` keeps everything in memory.
    path: Option<PathBuf>,
    doc: SettingsDocument,
}

impl JsonSettingsStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`. A missing file yields defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let doc = match read_document(&path)? {
            Some(doc) => {
                info!("JsonSettingsStore: loaded {}", path.display());
                doc
            }
            None => {
                info!(
                    "JsonSettingsStore: {} not found, using defaults",
                    path.display()
                );
                SettingsDocument::default()
            }
        };
        Ok(Self {
            path: Some(path),
            doc,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the file and report what changed since the last load.
    ///
    /// Invalid sensor records and an invalid system configuration are
    /// skipped with a warning; the previously loaded values stay in
    /// effect for them.
    pub fn reload(&mut self) -> Result<Vec<AppCommand>, SettingsError> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        let Some(mut fresh) = read_document(path)? else {
            debug!("JsonSettingsStore: {} vanished, keeping settings", path.display());
            return Ok(Vec::new());
        };

        let mut commands = Vec::new();

        if let Err(e) = validate_config(&fresh.config) {
            warn!("JsonSettingsStore: ignoring new system config ({e})");
            fresh.config = self.doc.config.clone();
        } else if fresh.config != self.doc.config {
            if fresh.config.mode != self.doc.config.mode {
                commands.push(AppCommand::SetMode(fresh.config.mode));
            }
            let mut rest = fresh.config.clone();
            rest.mode = self.doc.config.mode;
            if rest != self.doc.config {
                info!("JsonSettingsStore: timing/retry changes take effect after restart");
            }
        }

        let mut ids: Vec<&String> = self.doc.sensors.keys().collect();
        ids.extend(fresh.sensors.keys().filter(|k| !self.doc.sensors.contains_key(*k)));

        let mut accepted = self.doc.sensors.clone();
        for key in ids {
            let old = self.doc.sensors.get(key).copied().unwrap_or_default();
            let new = fresh.sensors.get(key).copied().unwrap_or_default();
            if old == new {
                continue;
            }
            let Ok(sensor) = SensorId::new(key) else {
                warn!("JsonSettingsStore: ignoring sensor with invalid id {key:?}");
                continue;
            };
            if let Err(e) = validate_sensor_settings(&new) {
                warn!("JsonSettingsStore: ignoring settings for sensor {sensor} ({e})");
                continue;
            }
            commands.extend(
                old.diff(&new)
                    .into_iter()
                    .map(|change| AppCommand::SettingChanged {
                        sensor: sensor.clone(),
                        change,
                    }),
            );
            accepted.insert(key.clone(), new);
        }

        self.doc = SettingsDocument {
            config: fresh.config,
            sensors: accepted,
        };
        Ok(commands)
    }

    fn persist(&self) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&self.doc).map_err(|_| SettingsError::Io)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| {
            warn!("JsonSettingsStore: write {} failed: {e}", tmp.display());
            SettingsError::Io
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            warn!("JsonSettingsStore: rename to {} failed: {e}", path.display());
            SettingsError::Io
        })?;
        debug!("JsonSettingsStore: saved {}", path.display());
        Ok(())
    }
}

/// `Ok(None)` when the file does not exist.
fn read_document(path: &Path) -> Result<Option<SettingsDocument>, SettingsError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            warn!("JsonSettingsStore: read {} failed: {e}", path.display());
            return Err(SettingsError::Io);
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| {
            warn!("JsonSettingsStore: {} is corrupted: {e}", path.display());
            SettingsError::Corrupted
        })
}

impl SettingsPort for JsonSettingsStore {
    fn load_config(&self) -> Result<SystemConfig, SettingsError> {
        validate_config(&self.doc.config)?;
        Ok(self.doc.config.clone())
    }

    fn save_config(&mut self, config: &SystemConfig) -> Result<(), SettingsError> {
        validate_config(config)?;
        self.doc.config = config.clone();
        self.persist()
    }

    fn load_sensor(&self, sensor: &SensorId) -> Result<SensorSettings, SettingsError> {
        Ok(self
            .doc
            .sensors
            .get(sensor.as_str())
            .copied()
            .unwrap_or_default())
    }

    fn save_sensor(
        &mut self,
        sensor: &SensorId,
        settings: &SensorSettings,
    ) -> Result<(), SettingsError> {
        validate_sensor_settings(settings)?;
        self.doc
            .sensors
            .insert(sensor.as_str().to_owned(), *settings);
        self.persist()
    }
}
