use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode};
use tokio_util::sync::CancellationToken;
use todaysky_core::{
    Config, ForecastSource, GeoCoordinate, HolidaySource, Refresher, ServiceId, base_window,
    calendar::month_grid,
    connectivity::ConnectivityMonitor,
    grid::{project, unproject},
    provider::{forecast_client_from_config, holiday_client_from_config},
};

use crate::output;

/// How often `watch` re-probes connectivity.
const PROBE_INTERVAL: Duration = Duration::from_secs(30);
const PROBE_URL: &str = "https://apis.data.go.kr";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "todaysky", version, about = "Clock, weather and holiday calendar for Korea")]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// What `configure` sets: a service's API key, or the default location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureTarget {
    ApiKey(ServiceId),
    Location,
}

fn parse_configure_target(value: &str) -> Result<ConfigureTarget> {
    if value.eq_ignore_ascii_case("location") {
        return Ok(ConfigureTarget::Location);
    }
    ServiceId::try_from(value).map(ConfigureTarget::ApiKey)
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure an API key or the default location.
    Configure {
        /// `weather`, `holiday` or `location`.
        #[arg(value_parser = parse_configure_target)]
        target: ConfigureTarget,
    },

    /// Print the forecast grid cell for a coordinate.
    #[command(allow_negative_numbers = true)]
    Grid {
        /// Latitude in decimal degrees.
        lat: f64,
        /// Longitude in decimal degrees.
        lon: f64,
    },

    /// Print the forecast bulletin to query at a given local time.
    BaseTime {
        /// Local time as "YYYY-MM-DD HH:MM"; if absent, means "now".
        #[arg(long)]
        at: Option<String>,
    },

    /// Show current weather and the +6h outlook.
    #[command(allow_negative_numbers = true)]
    Forecast {
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },

    /// List public holidays for a month.
    Holidays {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },

    /// Print a month calendar with holidays marked.
    Calendar {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },

    /// Keep the dashboard refreshed and print updates until Ctrl-C.
    #[command(allow_negative_numbers = true)]
    Watch {
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { target } => configure(target),
            Command::Grid { lat, lon } => {
                let coord = GeoCoordinate::new(lat, lon);
                warn_if_out_of_range(coord);
                let cell = project(coord);
                let centre = unproject(cell);
                println!("nx={} ny={}", cell.nx, cell.ny);
                println!("cell centre: {:.4}, {:.4}", centre.latitude, centre.longitude);
                Ok(())
            }
            Command::BaseTime { at } => {
                let now = match at {
                    Some(s) => parse_local_time(&s)?,
                    None => Local::now().naive_local(),
                };
                let window = base_window(now);
                println!("base_date={} base_time={}", window.base_date(), window.base_time());
                Ok(())
            }
            Command::Forecast { lat, lon } => {
                let config = Config::load()?;
                let coord = resolve_location(&config, lat, lon)?;
                let client = forecast_client_from_config(&config)?;

                let snapshot = client
                    .fetch_snapshot(coord, Local::now().naive_local())
                    .await
                    .context("Failed to fetch forecast")?;
                output::print_snapshot(&snapshot);
                Ok(())
            }
            Command::Holidays { year, month } => {
                let config = Config::load()?;
                let (year, month) = resolve_month(year, month);
                let client = holiday_client_from_config(&config)?;

                let holidays = client
                    .holidays(year, month)
                    .await
                    .context("Failed to fetch holidays")?;
                output::print_holidays(year, month, &holidays);
                Ok(())
            }
            Command::Calendar { year, month } => {
                let config = Config::load()?;
                let (year, month) = resolve_month(year, month);

                // Holidays are a nicety here; print the grid without them if unavailable.
                let holidays = match holiday_client_from_config(&config) {
                    Ok(client) => client.holidays(year, month).await.unwrap_or_else(|err| {
                        tracing::warn!(error = %err, "could not fetch holidays");
                        Vec::new()
                    }),
                    Err(err) => {
                        tracing::debug!(error = %err, "holiday service not configured");
                        Vec::new()
                    }
                };

                let today = Local::now().date_naive();
                let days = month_grid(year, month, today, &holidays);
                output::print_calendar(year, month, &days);
                Ok(())
            }
            Command::Watch { lat, lon } => watch(lat, lon).await,
        }
    }
}

fn configure(target: ConfigureTarget) -> Result<()> {
    let mut config = Config::load()?;

    match target {
        ConfigureTarget::ApiKey(id) => {
            let key = Password::new(&format!("Service key for the {id} API (decoded form):"))
                .with_display_mode(PasswordDisplayMode::Masked)
                .without_confirmation()
                .prompt()
                .context("Failed to read API key")?;
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(anyhow!("API key must not be empty"));
            }
            config.upsert_api_key(id, key);
        }
        ConfigureTarget::Location => {
            let latitude = CustomType::<f64>::new("Latitude:")
                .with_error_message("Please enter a number, e.g. 37.5665")
                .prompt()
                .context("Failed to read latitude")?;
            let longitude = CustomType::<f64>::new("Longitude:")
                .with_error_message("Please enter a number, e.g. 126.9780")
                .prompt()
                .context("Failed to read longitude")?;

            let coord = GeoCoordinate::new(latitude, longitude);
            warn_if_out_of_range(coord);
            config.set_location(coord);
        }
    }

    config.save()?;
    println!("Saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn watch(lat: Option<f64>, lon: Option<f64>) -> Result<()> {
    let config = Config::load()?;
    let coord = resolve_location(&config, lat, lon)?;
    let forecast = Arc::new(forecast_client_from_config(&config)?);
    let holidays = Arc::new(holiday_client_from_config(&config)?);

    let monitor = ConnectivityMonitor::new();
    let shutdown = CancellationToken::new();

    let (refresher, mut events) = Refresher::new(forecast, holidays, monitor.clone(), coord);
    let refresher_task = tokio::spawn(refresher.run(shutdown.clone()));
    let probe_task = tokio::spawn(monitor.watch_network(
        PROBE_URL.to_string(),
        PROBE_INTERVAL,
        shutdown.clone(),
    ));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                shutdown.cancel();
                break;
            }
            event = events.recv() => match event {
                Some(event) => output::print_event(&event),
                None => break,
            },
        }
    }

    shutdown.cancel();
    let _ = tokio::join!(refresher_task, probe_task);
    Ok(())
}

fn resolve_location(config: &Config, lat: Option<f64>, lon: Option<f64>) -> Result<GeoCoordinate> {
    let coord = match (lat, lon) {
        (Some(lat), Some(lon)) => GeoCoordinate::new(lat, lon),
        _ => config.require_location()?,
    };
    warn_if_out_of_range(coord);
    Ok(coord)
}

fn resolve_month(year: Option<i32>, month: Option<u32>) -> (i32, u32) {
    let today = Local::now().date_naive();
    (year.unwrap_or(today.year()), month.unwrap_or(today.month()))
}

fn warn_if_out_of_range(coord: GeoCoordinate) {
    if !coord.is_in_range() {
        tracing::warn!(
            latitude = coord.latitude,
            longitude = coord.longitude,
            "coordinate is outside the valid range; the grid cell will be meaningless"
        );
    }
}

fn parse_local_time(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .with_context(|| format!("Invalid time '{s}', expected \"YYYY-MM-DD HH:MM\""))
}
