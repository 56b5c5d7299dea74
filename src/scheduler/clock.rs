//! Time source for the scheduler.

use chrono::{Local, NaiveDateTime};
use std::sync::Mutex;

/// Supplies the local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The system clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jumps to `now`.
    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut current) = self.now.lock() {
            *current = now;
        }
    }

    /// Moves forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        if let Ok(mut current) = self.now.lock() {
            *current += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
