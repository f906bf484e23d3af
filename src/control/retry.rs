//! Retry guard for invalid sensor readings.
//!
//! Each sensor owns one guard. It is fed once per tick with whether the
//! sensor produced a reading and answers with what the condition tracker
//! should do this tick.
//!
//! ## Counter lifecycle
//!
//! 1. A valid reading resets the counter to 0 and evaluation proceeds with
//!    that reading in the same tick.
//! 2. Each absent reading below the limit increments the counter; the
//!    conditions keep last tick's activity (freeze).
//! 3. The absent reading that brings the counter to the limit releases both
//!    conditions, once.
//! 4. Further absent readings keep the counter pinned at the limit and stay
//!    frozen (released). Only a valid reading brings it back to 0.
//!
//! Failures never accumulate across separate runs: only `limit` absent
//! readings in a row trigger a release.

/// What the condition tracker should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Evaluate both conditions against the current reading.
    Proceed,
    /// Keep both condition activities exactly as they were.
    Freeze,
    /// Force both condition activities to `false`.
    Release,
}

/// Classification of a sensor's reading stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Retrying,
    Exhausted,
}

/// Result of feeding one reading to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub action: RetryAction,
    /// Counter value after this reading.
    pub failed_reads: u32,
    /// Counter value before this reading; non-zero with `Proceed` means
    /// the sensor just recovered.
    pub previous: u32,
}

impl RetryDecision {
    pub fn recovered(&self) -> bool {
        self.action == RetryAction::Proceed && self.previous > 0
    }
}

/// Per-sensor consecutive-failure counter.
#[derive(Debug, Clone)]
pub struct RetryGuard {
    failed_reads: u32,
    limit: u32,
}

impl RetryGuard {
    /// `limit` is clamped to at least 1 so that a release is reachable.
    pub fn new(limit: u32) -> Self {
        Self {
            failed_reads: 0,
            limit: limit.max(1),
        }
    }

    /// Feed this tick's reading availability.
    pub fn classify(&mut self, reading_present: bool) -> RetryDecision {
        let previous = self.failed_reads;

        let action = if reading_present {
            self.failed_reads = 0;
            RetryAction::Proceed
        } else if self.failed_reads < self.limit {
            self.failed_reads += 1;
            if self.failed_reads == self.limit {
                RetryAction::Release
            } else {
                RetryAction::Freeze
            }
        } else {
            // Already released; stay pinned at the limit.
            RetryAction::Freeze
        };

        RetryDecision {
            action,
            failed_reads: self.failed_reads,
            previous,
        }
    }

    pub fn failed_reads(&self) -> u32 {
        self.failed_reads
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn freshness(&self) -> Freshness {
        match self.failed_reads {
            0 => Freshness::Fresh,
            n if n < self.limit => Freshness::Retrying,
            _ => Freshness::Exhausted,
        }
    }
}
