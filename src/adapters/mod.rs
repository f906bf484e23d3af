//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements    | Connects to                     |
//! |------------------|---------------|---------------------------------|
//! | `file_bus`       | BusPort       | JSON bus snapshot (bench/bridge) |
//! |                  | ServicePort   | JSON service path file          |
//! | `log_sink`       | EventSink     | `log` facade                    |
//! | `settings_store` | SettingsPort  | JSON settings file / in-memory  |

pub mod file_bus;
pub mod log_sink;
pub mod settings_store;
