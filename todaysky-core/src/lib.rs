//! Core library for the `todaysky` dashboard.
//!
//! This crate defines:
//! - Projection of coordinates onto the KMA forecast grid
//! - Selection of the forecast bulletin to query
//! - Extraction of current and +6h readings from a forecast
//! - Clients for the forecast and public-holiday services
//! - The refresh loop that drives a clock/weather/calendar display
//!
//! It is used by `todaysky-cli`, but can also be reused by other binaries or services.

pub mod base_time;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod forecast;
pub mod grid;
pub mod model;
pub mod provider;
pub mod refresh;
pub mod retry;

pub use base_time::{ForecastWindow, base_window};
pub use config::{Config, ServiceConfig};
pub use error::ApiError;
pub use forecast::WeatherIcon;
pub use grid::{GeoCoordinate, GridCell, project, unproject};
pub use model::{ForecastItem, ForecastReading, Holiday, WeatherSnapshot};
pub use provider::{ForecastSource, HolidaySource, ServiceId};
pub use refresh::{DashboardEvent, Refresher};
