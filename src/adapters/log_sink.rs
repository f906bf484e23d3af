//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (the binary routes it to stderr through
//! `tracing-subscriber`). A bus-publishing adapter would implement the
//! same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as one line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn on_off(active: bool) -> &'static str {
    if active { "on" } else { "off" }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Status(s) => {
                info!(
                    "STATUS | active={} | mode={:?} | ticks={} | sensors={}/{} enabled | \
                     configured=0b{:02b} | desired=[{}, {}]",
                    s.active,
                    s.mode,
                    s.tick_count,
                    s.enabled_sensors,
                    s.sensor_count,
                    s.configured_relays,
                    on_off(s.desired_relays[0]),
                    on_off(s.desired_relays[1]),
                );
            }
            AppEvent::Activated => info!("ENGINE | active"),
            AppEvent::Deactivated => info!("ENGINE | dormant"),
            AppEvent::SensorAdded(id) => info!("SENSOR | {} added", id),
            AppEvent::SensorRemoved(id) => info!("SENSOR | {} removed", id),
            AppEvent::ConditionChanged {
                sensor,
                slot,
                active,
            } => {
                info!("COND | {}[{}] -> {}", sensor, slot, on_off(*active));
            }
            AppEvent::SensorExhausted(id) => warn!("SENSOR | {} exhausted, conditions released", id),
            AppEvent::RelaySwitched { relay, active } => {
                info!("RELAY | {} -> {}", relay, on_off(*active));
            }
            AppEvent::RelayWriteFailed(relay) => warn!("RELAY | {} write rejected", relay),
        }
    }
}
