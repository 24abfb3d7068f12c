//! Session clocks.
//!
//! The sampler stamps every record with time elapsed since the session clock
//! was created. `MonotonicClock` is backed by `std::time::Instant`, so NTP
//! slews, DST and manual wall-clock edits never move it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait ClockSource: Send + Sync {
    /// Time elapsed since the clock's origin. Never decreases between calls.
    fn now(&self) -> Duration;

    fn now_ns(&self) -> u64 {
        // u64 nanoseconds covers ~584 years of session time
        self.now().as_nanos() as u64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Externally stepped clock for deterministic sampling.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(start.as_nanos() as u64),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::AcqRel);
    }

    /// Moves the clock to an absolute position. Used to simulate a platform
    /// clock that stalls or steps backwards.
    pub fn set(&self, at: Duration) {
        self.nanos.store(at.as_nanos() as u64, Ordering::Release);
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}
