// src/clock.rs
//
// Time source for internal dates and uidValidity seeding.
// Tests substitute a controllable clock.

use chrono::{DateTime, Utc};

/// Trait for components that need the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real clock implementation using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
