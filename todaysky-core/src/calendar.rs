//! Month grid for a Sunday-first calendar, with public holidays marked.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::model::Holiday;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarDay {
    /// Padding before the first of the month.
    Blank,
    Day {
        date: NaiveDate,
        day: u32,
        is_today: bool,
        is_holiday: bool,
        holiday_name: Option<String>,
    },
}

impl CalendarDay {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            CalendarDay::Blank => None,
            CalendarDay::Day { date, .. } => Some(*date),
        }
    }

    pub fn is_holiday(&self) -> bool {
        matches!(self, CalendarDay::Day { is_holiday: true, .. })
    }
}

/// Number of days in the given month, `None` if the month is invalid.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Cells for one month: blanks up to the first weekday, then one per day.
pub fn month_grid(year: i32, month: u32, today: NaiveDate, holidays: &[Holiday]) -> Vec<CalendarDay> {
    let (Some(first), Some(total)) = (NaiveDate::from_ymd_opt(year, month, 1), days_in_month(year, month))
    else {
        return Vec::new();
    };

    let leading = first.weekday().num_days_from_sunday() as usize;
    let mut cells = Vec::with_capacity(leading + total as usize);
    cells.extend(std::iter::repeat_n(CalendarDay::Blank, leading));

    for date in first.iter_days().take(total as usize) {
        let holiday = holidays.iter().find(|h| h.falls_on(date));
        cells.push(CalendarDay::Day {
            date,
            day: date.day(),
            is_today: date == today,
            is_holiday: holiday.is_some(),
            holiday_name: holiday.map(|h| h.date_name.clone()),
        });
    }

    cells
}
