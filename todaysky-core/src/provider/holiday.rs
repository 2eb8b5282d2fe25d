use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{error::ApiError, model::Holiday};

use super::{HolidaySource, http_client, read_body, result_code_error};

pub const DEFAULT_BASE_URL: &str = "https://apis.data.go.kr/B090041/openapi/service/SpcdeInfoService";

/// Client for the public holiday ("rest day") service.
///
/// Successful lookups are kept in memory for the life of the client, keyed by
/// `yyyyMM`; a second request for the same month never hits the network.
#[derive(Debug)]
pub struct HolidayClient {
    service_key: String,
    base_url: String,
    http: Client,
    cache: Mutex<HashMap<String, Vec<Holiday>>>,
}

impl HolidayClient {
    pub fn new(service_key: String) -> Self {
        Self::with_base_url(service_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(service_key: String, base_url: &str) -> Self {
        Self {
            service_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_key(year: i32, month: u32) -> String {
        format!("{year}{month:02}")
    }

    pub async fn cached(&self, year: i32, month: u32) -> Option<Vec<Holiday>> {
        self.cache.lock().await.get(&Self::cache_key(year, month)).cloned()
    }

    async fn fetch_month(&self, year: i32, month: u32) -> Result<Vec<Holiday>, ApiError> {
        let url = format!("{}/getRestDeInfo", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("serviceKey", self.service_key.clone()),
                ("solYear", year.to_string()),
                ("solMonth", format!("{month:02}")),
                ("_type", "json".to_string()),
            ])
            .send()
            .await?;

        let body = read_body(res, "Holiday").await?;
        parse_holidays(&body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

#[derive(Debug, Deserialize)]
struct HolidayItems {
    #[serde(default)]
    item: Option<OneOrMany<Holiday>>,
}

/// `items` is an object when there is data and `""` (or missing) when not.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemsField {
    Items(HolidayItems),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct HolidayBody {
    #[serde(default)]
    items: Option<ItemsField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HolidayHeader {
    result_code: String,
    #[serde(default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct HolidayResponseInner {
    header: Option<HolidayHeader>,
    body: HolidayBody,
}

#[derive(Debug, Deserialize)]
struct HolidayResponse {
    response: HolidayResponseInner,
}

/// Decode a holiday response body. An empty month decodes to an empty list.
pub fn parse_holidays(body: &str) -> Result<Vec<Holiday>, ApiError> {
    let parsed: HolidayResponse = serde_json::from_str(body)?;

    if let Some(header) = parsed.response.header.as_ref().filter(|h| h.result_code != "00") {
        return Err(result_code_error("Holiday", &header.result_code, &header.result_msg));
    }

    let holidays = match parsed.response.body.items {
        Some(ItemsField::Items(HolidayItems { item: Some(OneOrMany::Many(list)) })) => list,
        Some(ItemsField::Items(HolidayItems { item: Some(OneOrMany::One(single)) })) => vec![single],
        _ => Vec::new(),
    };
    Ok(holidays)
}

#[async_trait]
impl HolidaySource for HolidayClient {
    async fn holidays(&self, year: i32, month: u32) -> Result<Vec<Holiday>, ApiError> {
        let key = Self::cache_key(year, month);

        if let Some(hit) = self.cache.lock().await.get(&key) {
            tracing::debug!(%key, "holiday cache hit");
            return Ok(hit.clone());
        }

        let holidays = self.fetch_month(year, month).await?;
        tracing::info!(%key, count = holidays.len(), "fetched holidays");

        self.cache.lock().await.insert(key, holidays.clone());
        Ok(holidays)
    }
}
