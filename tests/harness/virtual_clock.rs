// tests/harness/virtual_clock.rs
//
// Virtual clock for testing delivery dates and uidValidity seeding.
// Allows tests to control time without waiting for real time to pass.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

use imap_mailstore::Clock;

/// A clock that can be controlled for testing.
/// Thread-safe via Arc<RwLock<...>>; clones share the same time.
#[derive(Clone)]
pub struct VirtualClock {
    inner: Arc<RwLock<DateTime<Utc>>>,
}

impl VirtualClock {
    /// Create a virtual clock set to a specific time.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(time)),
        }
    }

    /// Advance time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut guard = self.inner.write().unwrap();
        *guard += duration;
    }

    /// Advance time by the given number of days.
    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }

    /// Set the clock to a specific time.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.inner.write().unwrap() = time;
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.read().unwrap()
    }
}
