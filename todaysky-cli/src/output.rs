use std::fmt::Write;

use todaysky_core::{DashboardEvent, Holiday, WeatherSnapshot, calendar::CalendarDay};

const WEEKDAYS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

pub fn print_snapshot(snapshot: &WeatherSnapshot) {
    print!("{}", render_snapshot(snapshot));
}

pub fn print_holidays(year: i32, month: u32, holidays: &[Holiday]) {
    print!("{}", render_holidays(year, month, holidays));
}

pub fn print_calendar(year: i32, month: u32, days: &[CalendarDay]) {
    print!("{}", render_calendar(year, month, days));
}

pub fn print_event(event: &DashboardEvent) {
    match event {
        DashboardEvent::Clock { now } => println!("[clock] {}", now.format("%H:%M")),
        DashboardEvent::Date { date } => println!("[date] {}", date.format("%Y-%m-%d (%a)")),
        DashboardEvent::Calendar { year, month, days } => {
            print!("{}", render_calendar(*year, *month, days));
        }
        DashboardEvent::Weather { snapshot } => print!("{}", render_snapshot(snapshot)),
        DashboardEvent::Holidays { year, month, holidays } => {
            print!("{}", render_holidays(*year, *month, holidays));
        }
        DashboardEvent::Error { resource, message } => {
            eprintln!("[{}] {message}", resource.label());
        }
        DashboardEvent::Offline => eprintln!("[network] offline, waiting for connection"),
    }
}

fn render_snapshot(snapshot: &WeatherSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Grid {} (bulletin {})", snapshot.cell, snapshot.window);
    for (label, reading) in [("Now", &snapshot.current), ("+6h", &snapshot.later)] {
        let _ = writeln!(
            out,
            "  {label:<4} {:>3}°C  {:>3}%  {}",
            reading.temperature_display(),
            reading.humidity_display(),
            reading.icon
        );
    }
    out
}

fn render_holidays(year: i32, month: u32, holidays: &[Holiday]) -> String {
    let mut out = String::new();
    if holidays.is_empty() {
        let _ = writeln!(out, "No public holidays in {year}-{month:02}");
        return out;
    }

    let _ = writeln!(out, "Public holidays in {year}-{month:02}:");
    for holiday in holidays {
        match holiday.date() {
            Some(date) => {
                let _ = writeln!(out, "  {}  {}", date.format("%m-%d %a"), holiday.date_name);
            }
            None => {
                let _ = writeln!(out, "  {}  {}", holiday.locdate, holiday.date_name);
            }
        }
    }
    out
}

/// Sunday-first text grid. Today is bracketed, holidays are starred and
/// listed beneath the grid.
fn render_calendar(year: i32, month: u32, days: &[CalendarDay]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "      {year}-{month:02}");
    let _ = writeln!(out, "{}", WEEKDAYS.map(|d| format!(" {d} ")).join(""));

    for week in days.chunks(7) {
        for cell in week {
            let text = match cell {
                CalendarDay::Blank => "    ".to_string(),
                CalendarDay::Day {
                    day,
                    is_today: true,
                    ..
                } => format!("[{day:>2}]"),
                CalendarDay::Day {
                    day,
                    is_holiday: true,
                    ..
                } => format!(" {day:>2}*"),
                CalendarDay::Day { day, .. } => format!(" {day:>2} "),
            };
            out.push_str(&text);
        }
        out.push('\n');
    }

    for cell in days {
        if let CalendarDay::Day {
            day,
            holiday_name: Some(name),
            ..
        } = cell
        {
            let _ = writeln!(out, "  * {day:>2}  {name}");
        }
    }
    out
}
