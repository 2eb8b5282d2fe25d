//! Retry counters and cooldowns for the dashboard's two remote resources.

use std::time::Duration;

use chrono::NaiveDateTime;

/// Default number of quick retries before backing off.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Timing knobs for the refresher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Quick retries allowed per resource before a cooldown.
    pub max_retries: u32,
    /// Delay before a quick retry.
    pub retry_delay: Duration,
    /// Delay once quick retries are exhausted.
    pub cooldown: Duration,
    /// Minimum time between two weather requests.
    pub weather_interval: Duration,
    /// Delay between connectivity re-checks while offline.
    pub connectivity_retry_delay: Duration,
    /// Refresher tick period.
    pub tick: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(1),
            cooldown: Duration::from_secs(5 * 60),
            weather_interval: Duration::from_secs(30 * 60),
            connectivity_retry_delay: Duration::from_secs(1),
            tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again shortly; the counter was incremented.
    RetryAfter(Duration),
    /// Quick retries are used up; the counter was reset.
    CooldownAfter(Duration),
}

/// Bounded retry counter.
#[derive(Debug, Clone)]
pub struct RetryCounter {
    attempts: u32,
    max: u32,
    retry_delay: Duration,
    cooldown: Duration,
}

impl RetryCounter {
    pub fn new(max: u32, retry_delay: Duration, cooldown: Duration) -> Self {
        Self { attempts: 0, max, retry_delay, cooldown }
    }

    pub fn from_policy(policy: &RefreshPolicy) -> Self {
        Self::new(policy.max_retries, policy.retry_delay, policy.cooldown)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        if self.attempts < self.max {
            self.attempts += 1;
            RetryDecision::RetryAfter(self.retry_delay)
        } else {
            self.attempts = 0;
            RetryDecision::CooldownAfter(self.cooldown)
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Rate limit for weather requests.
#[derive(Debug, Clone)]
pub struct WeatherGate {
    interval: chrono::Duration,
    last_request: Option<NaiveDateTime>,
}

impl WeatherGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::MAX),
            last_request: None,
        }
    }

    pub fn should_request(&self, now: NaiveDateTime, ignore_cooldown: bool) -> bool {
        if ignore_cooldown {
            return true;
        }
        match self.last_request {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.interval,
        }
    }

    pub fn mark_requested(&mut self, now: NaiveDateTime) {
        self.last_request = Some(now);
    }

    pub fn last_request(&self) -> Option<NaiveDateTime> {
        self.last_request
    }
}
