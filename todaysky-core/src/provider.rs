use crate::{
    Config,
    base_time::{ForecastWindow, base_window},
    error::ApiError,
    forecast,
    grid::{GeoCoordinate, GridCell, project},
    model::{ForecastItem, Holiday, WeatherSnapshot},
    provider::{holiday::HolidayClient, kma::KmaForecastClient},
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Response, StatusCode};
use std::{convert::TryFrom, fmt::Debug, time::Duration};

pub mod holiday;
pub mod kma;

/// Request timeout shared by both clients.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    Weather,
    Holiday,
}

impl ServiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Weather => "weather",
            ServiceId::Holiday => "holiday",
        }
    }

    pub const fn all() -> &'static [ServiceId] {
        &[ServiceId::Weather, ServiceId::Holiday]
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServiceId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "weather" => Ok(ServiceId::Weather),
            "holiday" => Ok(ServiceId::Holiday),
            _ => Err(anyhow::anyhow!(
                "Unknown service '{value}'. Supported services: weather, holiday."
            )),
        }
    }
}

/// Source of short-term forecast readings.
#[async_trait]
pub trait ForecastSource: Send + Sync + Debug {
    async fn fetch_items(
        &self,
        cell: GridCell,
        window: ForecastWindow,
    ) -> Result<Vec<ForecastItem>, ApiError>;

    /// Resolve the grid cell and bulletin for `coord` at local time `now`,
    /// fetch, and reduce to a snapshot.
    async fn fetch_snapshot(
        &self,
        coord: GeoCoordinate,
        now: NaiveDateTime,
    ) -> Result<WeatherSnapshot, ApiError> {
        let cell = project(coord);
        let window = base_window(now);
        let items = self.fetch_items(cell, window).await?;
        let (current, later) = forecast::summarize(&items);

        Ok(WeatherSnapshot { cell, window, current, later })
    }
}

/// Source of public holidays for one month.
#[async_trait]
pub trait HolidaySource: Send + Sync + Debug {
    async fn holidays(&self, year: i32, month: u32) -> Result<Vec<Holiday>, ApiError>;
}

/// Construct the forecast client from config.
pub fn forecast_client_from_config(config: &Config) -> anyhow::Result<KmaForecastClient> {
    let api_key = config.require_api_key(ServiceId::Weather)?;
    Ok(match config.base_url(ServiceId::Weather) {
        Some(url) => KmaForecastClient::with_base_url(api_key, url),
        None => KmaForecastClient::new(api_key),
    })
}

/// Construct the holiday client from config.
pub fn holiday_client_from_config(config: &Config) -> anyhow::Result<HolidayClient> {
    let api_key = config.require_api_key(ServiceId::Holiday)?;
    Ok(match config.base_url(ServiceId::Holiday) {
        Some(url) => HolidayClient::with_base_url(api_key, url),
        None => HolidayClient::new(api_key),
    })
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Read the body of a response, classifying failed statuses.
pub(crate) async fn read_body(res: Response, service: &str) -> Result<String, ApiError> {
    let status = res.status();
    let body = res.text().await?;

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(ApiError::Unauthorized(format!(
            "{service} rejected the service key ({status})"
        )));
    }
    if !status.is_success() {
        return Err(ApiError::Network(format!(
            "{service} request failed with status {status}: {}",
            truncate_body(&body),
        )));
    }
    // data.go.kr answers key problems with an XML document and status 200.
    if body.contains("SERVICE_KEY_IS_NOT_REGISTERED") {
        return Err(ApiError::Unauthorized(format!("{service}: service key is not registered")));
    }

    Ok(body)
}

/// Classify a non-"00" `resultCode` from the data.go.kr response header.
pub(crate) fn result_code_error(service: &str, code: &str, msg: &str) -> ApiError {
    match code {
        // access denied, unregistered key, expired key, unregistered domain/IP
        "20" | "30" | "31" | "32" => {
            ApiError::Unauthorized(format!("{service} returned {code}: {msg}"))
        }
        _ => ApiError::Parsing(format!("{service} returned {code}: {msg}")),
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let end = (0..=MAX).rev().find(|&i| body.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn service_id_as_str_roundtrip() {
        for id in ServiceId::all() {
            let parsed = ServiceId::try_from(id.as_str()).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_service_error() {
        let err = ServiceId::try_from("airkorea").unwrap_err();
        assert!(err.to_string().contains("Unknown service"));
    }

    #[test]
    fn holiday_client_from_config_uses_stored_key() {
        let mut cfg = Config::default();
        cfg.upsert_api_key(ServiceId::Holiday, "KEY".to_string());
        assert!(holiday_client_from_config(&cfg).is_ok());
    }

    #[test]
    fn result_codes() {
        assert!(matches!(result_code_error("x", "30", "SERVICE_KEY"), ApiError::Unauthorized(_)));
        assert!(matches!(result_code_error("x", "03", "NO_DATA"), ApiError::Parsing(_)));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "가".repeat(100);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
    }
}
