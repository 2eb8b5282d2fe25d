//! Selection of the forecast bulletin ("base date/time") to query.
//!
//! The short-term forecast is issued eight times a day. A bulletin becomes
//! available roughly 45 minutes after its nominal hour, so a client asking at
//! 11:20 must still use the 08:00 bulletin.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hours at which a bulletin is issued.
pub const ISSUANCE_HOURS: [u32; 8] = [2, 5, 8, 11, 14, 17, 20, 23];

/// Minutes after the hour before that hour's bulletin is published.
pub const PUBLICATION_LAG_MINUTES: u32 = 45;

const DATE_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid base_date '{0}', expected yyyyMMdd")]
    InvalidDate(String),

    #[error("invalid base_time '{0}', expected one of 0200, 0500, ..., 2300")]
    InvalidTime(String),
}

/// A forecast issuance slot, used as the `base_date`/`base_time` query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct ForecastWindow {
    date: NaiveDate,
    hour: u32,
}

/// Unchecked wire form of [`ForecastWindow`].
#[derive(Deserialize)]
struct RawWindow {
    date: NaiveDate,
    hour: u32,
}

impl TryFrom<RawWindow> for ForecastWindow {
    type Error = WindowError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        if !ISSUANCE_HOURS.contains(&raw.hour) {
            return Err(WindowError::InvalidTime(format!("{:02}00", raw.hour)));
        }
        Ok(Self {
            date: raw.date,
            hour: raw.hour,
        })
    }
}

impl ForecastWindow {
    /// Parse the two query strings back into a window.
    pub fn parse(base_date: &str, base_time: &str) -> Result<Self, WindowError> {
        if base_date.len() != 8 || !base_date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WindowError::InvalidDate(base_date.to_string()));
        }
        let date = NaiveDate::parse_from_str(base_date, DATE_FORMAT)
            .map_err(|_| WindowError::InvalidDate(base_date.to_string()))?;

        let hour = base_time
            .strip_suffix("00")
            .filter(|h| h.len() == 2)
            .and_then(|h| h.parse::<u32>().ok())
            .filter(|h| ISSUANCE_HOURS.contains(h))
            .ok_or_else(|| WindowError::InvalidTime(base_time.to_string()))?;

        Ok(Self { date, hour })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Issuance hour, always one of [`ISSUANCE_HOURS`].
    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// `yyyyMMdd`
    pub fn base_date(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// `HH00`
    pub fn base_time(&self) -> String {
        format!("{:02}00", self.hour)
    }

    /// Issuance instant as a naive local timestamp.
    pub fn issued_at(&self) -> NaiveDateTime {
        self.date.and_hms_opt(self.hour, 0, 0).unwrap_or_default()
    }
}

impl fmt::Display for ForecastWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.base_date(), self.base_time())
    }
}

/// Most recent bulletin that is already published at local time `now`.
///
/// `now` must be the caller's local wall-clock time; the rule is defined in
/// terms of the provider's local hours, not UTC instants.
pub fn base_window(now: NaiveDateTime) -> ForecastWindow {
    let effective = if now.minute() < PUBLICATION_LAG_MINUTES {
        now.checked_sub_signed(Duration::hours(1)).unwrap_or(now)
    } else {
        now
    };
    let hour = effective.hour();
    let date = effective.date();

    match ISSUANCE_HOURS.iter().rev().find(|&&h| h <= hour) {
        Some(&base_hour) => ForecastWindow { date, hour: base_hour },
        // Before the first bulletin of the day: last bulletin of yesterday.
        None => ForecastWindow {
            date: date.pred_opt().unwrap_or(date),
            hour: 23,
        },
    }
}
