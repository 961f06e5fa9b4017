// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injectable clock abstraction.
//!
//! The Watchdog and Agent Protocol Bridge both need to reason about elapsed
//! time (stall detection, per-call deadlines). A trait keeps that reasoning
//! testable without sleeping in unit tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Abstracts wall-clock access so timing-sensitive code can be driven by a
/// fake clock in tests.
pub trait Clock: Send + Sync + 'static {
    /// Monotonic instant, comparable only to other instants from the same clock.
    fn now(&self) -> Instant;
}

/// Real clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock whose value only advances when told to, for deterministic tests.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Advance the fake clock by `d`.
    pub fn advance(&self, d: Duration) {
        let mut guard = self.inner.lock();
        *guard += d;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.inner.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
