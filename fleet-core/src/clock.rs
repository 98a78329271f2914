//! Injectable time source. The reaper and every `last_updated` stamp go
//! through a `Clock` so tests can advance time deterministically instead
//! of racing the wall clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Monotonic-or-wall Unix seconds. Callers only rely on it being
    /// non-decreasing across calls on the same `Clock`.
    fn now(&self) -> i64;
}

/// The production clock, backed by the system wall clock.
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs() as i64
    }
}

/// A manually advanced clock for tests.
pub struct TestClock {
    seconds: AtomicI64,
}

impl TestClock {
    pub fn new(start: i64) -> Self {
        Self { seconds: AtomicI64::new(start) }
    }

    pub fn advance(&self, delta: i64) {
        self.seconds.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set(&self, value: i64) {
        self.seconds.store(value, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> i64 {
        self.seconds.load(Ordering::SeqCst)
    }
}
