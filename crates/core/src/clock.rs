// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Clock abstraction for testable time handling.
//!
//! Pollers and the heartbeat/orphan detector compare persisted timestamps
//! against "now" constantly; routing every comparison through a [`Clock`]
//! means tests can drive minutes of simulated wall-clock behavior without
//! ever sleeping.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A clock that provides the current time, both monotonic and wall-clock.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant, used for measuring elapsed durations.
    fn now(&self) -> Instant;
    /// Wall-clock time, used for persisted timestamps (`scheduledAt`,
    /// `updatedAt`, ...).
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable time.
///
/// `now()` and `now_utc()` advance together: [`FakeClock::advance`] moves
/// both the monotonic instant and the wall-clock time by the same duration,
/// so elapsed-time math stays consistent across the two.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
    utc: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
            utc: Arc::new(Mutex::new(DateTime::UNIX_EPOCH)),
        }
    }

    /// Start the fake clock at a specific wall-clock time.
    pub fn at(utc: DateTime<Utc>) -> Self {
        let clock = Self::new();
        *clock.utc.lock() = utc;
        clock
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
        if let Ok(delta) = chrono::Duration::from_std(duration) {
            *self.utc.lock() += delta;
        }
    }

    /// Set the wall-clock time directly.
    pub fn set_utc(&self, utc: DateTime<Utc>) {
        *self.utc.lock() = utc;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
