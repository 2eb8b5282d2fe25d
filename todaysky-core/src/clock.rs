//! Wall-clock access and minute/day/month change detection.

use std::sync::{Arc, Mutex};

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

/// Source of the local wall-clock time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local time of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to. Handy for pinning "today".
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Arc::new(Mutex::new(now)) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.lock().map(|guard| *guard).unwrap_or_default()
    }
}

/// What changed since the previous observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockChanges {
    pub minute: bool,
    pub day: bool,
    pub month: bool,
}

/// Remembers the last observed minute/day/month.
///
/// Day is only compared when the minute moved, and month only when the day
/// moved, so a single observation never reports a month change alone.
#[derive(Debug, Clone, Default)]
pub struct ClockTracker {
    minute: Option<u32>,
    day: Option<u32>,
    month: Option<u32>,
}

impl ClockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker seeded with `now`, so the next observation of the same minute
    /// reports nothing.
    pub fn starting_at(now: NaiveDateTime) -> Self {
        Self {
            minute: Some(now.minute()),
            day: Some(now.day()),
            month: Some(now.month()),
        }
    }

    pub fn observe(&mut self, now: NaiveDateTime) -> ClockChanges {
        let mut changes = ClockChanges::default();

        if self.minute != Some(now.minute()) {
            changes.minute = true;
            if self.day != Some(now.day()) {
                changes.day = true;
                if self.month != Some(now.month()) {
                    changes.month = true;
                    self.month = Some(now.month());
                }
                self.day = Some(now.day());
            }
            self.minute = Some(now.minute());
        }

        changes
    }
}
