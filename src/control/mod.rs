//! Control primitives: pure decision logic with no I/O.
//!
//! - [`hysteresis`]: two-threshold comparator deciding condition activity.
//! - [`retry`]: per-sensor grace period over consecutive failed reads.

pub mod hysteresis;
pub mod retry;
