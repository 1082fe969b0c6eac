//! Local date and time, refreshed exactly at each minute rollover.

use crate::config::CLOCK_FORMAT;
use crate::error::Result;
use crate::provider::{Provider, Registration, WatchSpec};
use chrono::{DateTime, Local, Timelike};
use std::time::Duration;

/// Time until the next minute boundary after `now`.
pub fn next_minute_delay<T: Timelike>(now: &T) -> Duration {
    let second = now.second().min(59);
    // Leap seconds are reported as nanoseconds >= 1e9.
    let nanos = now.nanosecond().min(999_999_999);
    Duration::from_secs(60) - Duration::new(u64::from(second), nanos)
}

pub struct ClockProvider {
    now: Box<dyn Fn() -> DateTime<Local>>,
    next_delay: Option<Duration>,
}

impl ClockProvider {
    pub fn new() -> Self {
        Self::with_time_source(Local::now)
    }

    /// Build a clock reading time from `now` instead of the system clock.
    pub fn with_time_source(now: impl Fn() -> DateTime<Local> + 'static) -> Self {
        Self {
            now: Box::new(now),
            next_delay: None,
        }
    }

    pub fn init() -> Result<Registration> {
        Ok(Registration::new(Self::new()).watch(WatchSpec::NextDeadline))
    }
}

impl Default for ClockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ClockProvider {
    fn query(&mut self) -> Result<Option<String>> {
        let now = (self.now)();
        self.next_delay = Some(next_minute_delay(&now));
        Ok(Some(now.format(CLOCK_FORMAT).to_string()))
    }

    fn next_delay(&self) -> Option<Duration> {
        self.next_delay
    }
}
