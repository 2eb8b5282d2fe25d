use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{base_time::ForecastWindow, forecast::WeatherIcon, grid::GridCell};

/// Displayed in place of a value the forecast did not contain.
pub const MISSING: &str = "--";

/// One reading from a forecast response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastItem {
    pub fcst_date: String,
    pub fcst_time: String,
    pub category: String,
    pub fcst_value: String,
}

impl ForecastItem {
    pub fn new(date: &str, time: &str, category: &str, value: &str) -> Self {
        Self {
            fcst_date: date.to_string(),
            fcst_time: time.to_string(),
            category: category.to_string(),
            fcst_value: value.to_string(),
        }
    }
}

/// Temperature, humidity and icon for one forecast slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastReading {
    pub temperature: Option<String>,
    pub humidity: Option<String>,
    pub icon: WeatherIcon,
}

impl ForecastReading {
    pub fn unknown() -> Self {
        Self {
            temperature: None,
            humidity: None,
            icon: WeatherIcon::Unknown,
        }
    }

    /// Integer part of the temperature, e.g. "27.3" -> "27".
    pub fn temperature_display(&self) -> &str {
        self.temperature
            .as_deref()
            .and_then(|t| t.split('.').find(|part| !part.is_empty()))
            .unwrap_or(MISSING)
    }

    pub fn humidity_display(&self) -> &str {
        self.humidity.as_deref().unwrap_or(MISSING)
    }
}

/// Current conditions and the +6h outlook for one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub cell: GridCell,
    pub window: ForecastWindow,
    pub current: ForecastReading,
    pub later: ForecastReading,
}

/// A public holiday as returned by the holiday service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub date_name: String,
    /// yyyyMMdd
    pub locdate: u32,
}

impl Holiday {
    pub fn date(&self) -> Option<NaiveDate> {
        let y = (self.locdate / 10_000) as i32;
        let m = self.locdate / 100 % 100;
        let d = self.locdate % 100;
        NaiveDate::from_ymd_opt(y, m, d)
    }

    pub fn falls_on(&self, date: NaiveDate) -> bool {
        self.date() == Some(date)
    }
}
