//! Crash logging and runtime diagnostics.
//!
//! A custom panic handler logs the panic reason before the process aborts
//! (`panic = "abort"`), so the supervisor sees the cause in the journal.
//!
//! Runtime metrics are cumulative counters kept by the
//! [`AppService`](crate::app::service::AppService) and rendered on demand.

use serde::Serialize;

/// Cumulative counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeMetrics {
    /// Evaluation ticks executed (active or dormant).
    pub ticks: u64,
    /// Relay commands written, including rejected ones.
    pub relay_commands: u64,
    /// Relay commands the bus rejected.
    pub write_failures: u64,
    /// Sensors whose retry grace period ran out.
    pub sensor_releases: u64,
    /// Times the engine went from dormant to active.
    pub activations: u32,
}

impl RuntimeMetrics {
    pub fn record_tick(&mut self) {
        self.ticks += 1;
    }

    pub fn record_command(&mut self, accepted: bool) {
        self.relay_commands += 1;
        if !accepted {
            self.write_failures += 1;
        }
    }

    pub fn record_release(&mut self) {
        self.sensor_releases += 1;
    }

    pub fn record_activation(&mut self) {
        self.activations += 1;
    }

    /// Compact JSON rendering for the status log line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ───────────────────────────────────────────────────────────────
// Custom panic handler
// ───────────────────────────────────────────────────────────────

/// Extract a printable reason from a panic payload.
fn panic_reason(payload: &(dyn core::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

/// Install a panic hook that logs the reason and location.
///
/// Must be called once during init, after logging is up. Relays are left
/// to the bus owner once the process is gone.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = panic_reason(info.payload());
        match info.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}
