//! Pulling displayable values out of a flat list of forecast readings.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::model::{ForecastItem, ForecastReading, MISSING};

pub const TEMPERATURE: &[&str] = &["TMP", "T1H"];
pub const HUMIDITY: &[&str] = &["REH"];
pub const SKY: &[&str] = &["SKY"];
pub const PRECIPITATION: &[&str] = &["PTY"];

/// Hours between the current reading and the outlook reading.
pub const OUTLOOK_HOURS: i64 = 6;

const SLOT_FORMAT: &str = "%Y%m%d%H%M";

/// Weather condition icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    Clear,
    Cloudy,
    Overcast,
    Rain,
    Sleet,
    Snow,
    HeavyRain,
    Unknown,
}

impl WeatherIcon {
    /// SF Symbols name, which is also what downstream displays key on.
    pub fn symbol(&self) -> &'static str {
        match self {
            WeatherIcon::Clear => "sun.max.fill",
            WeatherIcon::Cloudy => "cloud.fill",
            WeatherIcon::Overcast => "cloud.sun.fill",
            WeatherIcon::Rain => "cloud.rain.fill",
            WeatherIcon::Sleet => "cloud.sleet.fill",
            WeatherIcon::Snow => "snowflake",
            WeatherIcon::HeavyRain => "cloud.heavyrain.fill",
            WeatherIcon::Unknown => "questionmark.circle",
        }
    }
}

impl std::fmt::Display for WeatherIcon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A forecast date/time pair, e.g. ("20250723", "1500").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub date: String,
    pub time: String,
}

impl Slot {
    fn from_timestamp(ts: NaiveDateTime) -> Self {
        let s = ts.format(SLOT_FORMAT).to_string();
        let (date, time) = s.split_at(8);
        Self { date: date.to_string(), time: time.to_string() }
    }

    fn of(item: &ForecastItem) -> Option<NaiveDateTime> {
        let joined = format!("{}{}", item.fcst_date, item.fcst_time);
        NaiveDateTime::parse_from_str(&joined, SLOT_FORMAT).ok()
    }

    fn matches(&self, item: &ForecastItem) -> bool {
        item.fcst_date == self.date && item.fcst_time == self.time
    }
}

/// Precipitation type wins over sky state whenever it reports something falling.
pub fn resolve_icon(sky: &str, pty: &str) -> WeatherIcon {
    if let Ok(pty @ 1..) = pty.parse::<i32>() {
        return match pty {
            1 | 5 => WeatherIcon::Rain,
            2 | 6 => WeatherIcon::Sleet,
            3 | 7 => WeatherIcon::Snow,
            4 => WeatherIcon::HeavyRain,
            _ => WeatherIcon::Rain,
        };
    }

    match sky {
        "1" => WeatherIcon::Clear,
        "3" => WeatherIcon::Cloudy,
        "4" => WeatherIcon::Overcast,
        _ => WeatherIcon::Unknown,
    }
}

/// First value for any of `categories`, optionally restricted to one slot.
pub fn first_value<'a>(
    items: &'a [ForecastItem],
    categories: &[&str],
    slot: Option<&Slot>,
) -> Option<&'a str> {
    items
        .iter()
        .filter(|item| slot.is_none_or(|s| s.matches(item)))
        .find(|item| categories.contains(&item.category.as_str()))
        .map(|item| item.fcst_value.as_str())
}

fn icon_for(items: &[ForecastItem], slot: Option<&Slot>) -> WeatherIcon {
    let sky = first_value(items, SKY, slot).unwrap_or(MISSING);
    let pty = first_value(items, PRECIPITATION, slot).unwrap_or(MISSING);
    resolve_icon(sky, pty)
}

/// Reading taken from the first matching entries, regardless of slot.
pub fn current_reading(items: &[ForecastItem]) -> ForecastReading {
    ForecastReading {
        temperature: first_value(items, TEMPERATURE, None).map(str::to_string),
        humidity: first_value(items, HUMIDITY, None).map(str::to_string),
        icon: icon_for(items, None),
    }
}

/// Reading for the slot `hours` after the first item's slot.
pub fn reading_after(items: &[ForecastItem], hours: i64) -> ForecastReading {
    let Some(start) = items.first().and_then(Slot::of) else {
        return ForecastReading::unknown();
    };
    let Some(target) = start.checked_add_signed(Duration::hours(hours)) else {
        return ForecastReading::unknown();
    };
    let slot = Slot::from_timestamp(target);

    ForecastReading {
        temperature: first_value(items, TEMPERATURE, Some(&slot)).map(str::to_string),
        humidity: first_value(items, HUMIDITY, Some(&slot)).map(str::to_string),
        icon: icon_for(items, Some(&slot)),
    }
}

/// Current reading and the [`OUTLOOK_HOURS`] outlook.
pub fn summarize(items: &[ForecastItem]) -> (ForecastReading, ForecastReading) {
    (current_reading(items), reading_after(items, OUTLOOK_HOURS))
}
