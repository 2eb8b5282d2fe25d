use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{base_time::ForecastWindow, error::ApiError, grid::GridCell, model::ForecastItem};

use super::{ForecastSource, http_client, read_body, result_code_error};

pub const DEFAULT_BASE_URL: &str = "https://apis.data.go.kr/1360000/VilageFcstInfoService_2.0";

/// Rows requested per call; covers the first several forecast hours.
const ROWS_PER_PAGE: u32 = 100;

/// Client for the KMA short-term ("village") forecast service.
///
/// `service_key` is the decoded key from data.go.kr; it is URL-encoded here.
#[derive(Debug, Clone)]
pub struct KmaForecastClient {
    service_key: String,
    base_url: String,
    http: Client,
}

impl KmaForecastClient {
    pub fn new(service_key: String) -> Self {
        Self::with_base_url(service_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(service_key: String, base_url: &str) -> Self {
        Self {
            service_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client(),
        }
    }

    /// Query parameters for one forecast request.
    pub fn query(&self, cell: GridCell, window: ForecastWindow) -> Vec<(&'static str, String)> {
        vec![
            ("serviceKey", self.service_key.clone()),
            ("numOfRows", ROWS_PER_PAGE.to_string()),
            ("pageNo", "1".to_string()),
            ("dataType", "JSON".to_string()),
            ("base_date", window.base_date()),
            ("base_time", window.base_time()),
            ("nx", cell.nx.to_string()),
            ("ny", cell.ny.to_string()),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KmaHeader {
    result_code: String,
    #[serde(default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct KmaItems {
    item: Vec<ForecastItem>,
}

#[derive(Debug, Deserialize)]
struct KmaBody {
    items: KmaItems,
}

#[derive(Debug, Deserialize)]
struct KmaResponseInner {
    header: Option<KmaHeader>,
    body: Option<KmaBody>,
}

#[derive(Debug, Deserialize)]
struct KmaResponse {
    response: KmaResponseInner,
}

/// Decode a forecast response body into its items.
pub fn parse_forecast(body: &str) -> Result<Vec<ForecastItem>, ApiError> {
    let parsed: KmaResponse = serde_json::from_str(body)?;

    if let Some(header) = parsed.response.header.as_ref().filter(|h| h.result_code != "00") {
        return Err(result_code_error("KMA forecast", &header.result_code, &header.result_msg));
    }

    parsed
        .response
        .body
        .map(|b| b.items.item)
        .ok_or_else(|| ApiError::Parsing("KMA forecast response has no body".to_string()))
}

#[async_trait]
impl ForecastSource for KmaForecastClient {
    async fn fetch_items(
        &self,
        cell: GridCell,
        window: ForecastWindow,
    ) -> Result<Vec<ForecastItem>, ApiError> {
        let url = format!("{}/getVilageFcst", self.base_url);
        tracing::debug!(%cell, %window, "requesting village forecast");

        let res = self.http.get(&url).query(&self.query(cell, window)).send().await?;
        let body = read_body(res, "KMA forecast").await?;
        let items = parse_forecast(&body)?;

        tracing::debug!(count = items.len(), "received forecast items");
        Ok(items)
    }
}
