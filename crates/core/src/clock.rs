// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling.
//!
//! The failure-delay queue and per-request deadlines are timer-driven;
//! routing them through this trait lets tests advance time deterministically
//! instead of sleeping in wall-clock time.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Real system clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Fake clock for testing with controllable time.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { current: Arc::new(Mutex::new(Instant::now())) }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_increasing_time() {
        let clock = SystemClock;
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(1));
        let t2 = clock.now();
        assert!(t2 > t1);
    }

    #[test]
    fn fake_clock_can_be_advanced() {
        let clock = FakeClock::new();
        let t1 = clock.now();
        clock.advance(Duration::from_secs(60));
        let t2 = clock.now();
        assert!(t2.duration_since(t1) >= Duration::from_secs(60));
    }

    #[test]
    fn fake_clock_is_cloneable_and_shared() {
        let clock1 = FakeClock::new();
        let clock2 = clock1.clone();
        let t1 = clock1.now();
        clock2.advance(Duration::from_secs(30));
        let t2 = clock1.now();
        assert!(t2.duration_since(t1) >= Duration::from_secs(30));
    }
}
