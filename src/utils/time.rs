//! Monotonic millisecond clocks.
//!
//! Every deadline in the session (backoff, handshake wait, watchdog) is an absolute
//! millisecond value compared against a [`Clock`], never a relative sleep, so the
//! polling frequency only affects accuracy up to one poll interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Packet timestamp ticks per clock millisecond
pub const TICKS_PER_MILLI: u64 = 10_000;

/// Source of monotonic time in milliseconds since an arbitrary origin.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since the clock was created.
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

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests and simulations.
///
/// Clones share the same time, so a test can hold one handle while the session
/// (and any scripted transport) holds others.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert a clock reading into the packet timestamp field.
#[inline]
pub fn ticks_from_millis(ms: u64) -> u64 {
    ms.saturating_mul(TICKS_PER_MILLI)
}

/// Absolute deadline `after` from `now_ms`.
#[inline]
pub fn deadline(now_ms: u64, after: Duration) -> u64 {
    now_ms.saturating_add(after.as_millis() as u64)
}
