//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules of the relay controller:
//! tick orchestration, notification handling and relay ownership. All
//! interaction with the bus and the settings store happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without a running bus.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
