//! Execution-time bookkeeping for the control tick.
//!
//! The periodic handler must finish well inside its period. `TickTimer`
//! records how long each tick took so overruns can be logged and reported.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Accumulating timer for tracking total and worst-case tick time.
pub struct TickTimer {
    total_ns: AtomicU64,
    max_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TickTimer {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            max_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Run `f`, record its execution time, and return its result with the duration.
    pub fn measure<R>(&self, f: impl FnOnce() -> R) -> (R, Duration) {
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed();
        self.record(elapsed);
        (out, elapsed)
    }

    pub fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.max_ns.fetch_max(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_ns.load(Ordering::Relaxed))
    }

    /// Longest single tick seen since the last reset.
    pub fn worst(&self) -> Duration {
        Duration::from_nanos(self.max_ns.load(Ordering::Relaxed))
    }

    pub fn average(&self) -> Duration {
        let count = self.count();
        if count > 0 {
            self.total() / count as u32
        } else {
            Duration::ZERO
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.max_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_worst_and_average() {
        let t = TickTimer::new();
        t.record(Duration::from_millis(2));
        t.record(Duration::from_millis(6));
        assert_eq!(t.count(), 2);
        assert_eq!(t.worst(), Duration::from_millis(6));
        assert_eq!(t.average(), Duration::from_millis(4));
        t.reset();
        assert_eq!(t.count(), 0);
        assert_eq!(t.average(), Duration::ZERO);
    }

    #[test]
    fn measure_returns_value() {
        let t = TickTimer::new();
        let (v, _) = t.measure(|| 41 + 1);
        assert_eq!(v, 42);
        assert_eq!(t.count(), 1);
    }
}
