//! Temperature relay controller library.
//!
//! Exposes the pure-logic modules for integration testing and for the
//! `temprelay` binary. Everything that touches files lives in [`adapters`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod relays;
pub mod sensors;
