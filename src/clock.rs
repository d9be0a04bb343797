//! Clock capability.
//!
//! The router never reads the system clock directly; it goes through
//! [`Clock`] so tests can pin file-name interpolation and header start-up
//! records to a [`MockClock`] with settable, advanceable time.
//!
//! The trait speaks chrono: the router consumes instants as civil
//! datetimes (local time for file names and the header's start-up
//! record), so the capability hands them out in that form instead of
//! leaving every call site to convert.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Local, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// The current instant in the system-local zone. File names and the
    /// header's start-up record are written in local time.
    fn now_local(&self) -> DateTime<Local> {
        self.now().with_timezone(&Local)
    }
}

/// The real system clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock under test control.
#[derive(Debug)]
pub struct MockClock {
    now: RwLock<DateTime<Utc>>,
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// A mock pinned to the given instant.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(instant),
        }
    }

    /// A mock starting at the current system time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().unwrap();
        *now = *now + duration;
    }

    /// Pins the clock to a new instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.write().unwrap() = instant;
    }
}
