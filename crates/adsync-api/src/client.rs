//! Reporting API client
//!
//! Fetches daily campaign performance from
//! `GET {base_url}/customers/{customer_id}/campaign-performance`
//! with `start_date`/`end_date` query parameters (inclusive, `YYYY-MM-DD`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use adsync_api::client::ReportingClient;
//! use adsync_core::domain::{CustomerId, DateRange};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ReportingClient::with_base_url("token", "https://reports.example.com");
//! let customer = CustomerId::new("413-902-2884")?;
//! let rows = client
//!     .fetch_rows(&customer, DateRange::parse("2025-09-01", "2025-09-30")?)
//!     .await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use adsync_core::{
    config::ApiConfig,
    domain::{window::DATE_FORMAT, CampaignRow, CustomerId, DataSource, DateRange},
    ports::IPerformanceSource,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::ApiError;

/// Cost values arrive in millionths of the account currency
const MICROS_PER_UNIT: f64 = 1_000_000.0;

/// Longest response body quoted in an error
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct PerformanceResponse {
    #[serde(default)]
    rows: Vec<PerformanceRow>,
}

/// One row as returned by the API
#[derive(Debug, Deserialize)]
struct PerformanceRow {
    #[serde(default)]
    data_source: Option<DataSource>,
    date: NaiveDate,
    campaign_id: String,
    #[serde(default)]
    campaign_name: Option<String>,
    #[serde(default)]
    campaign_status: Option<String>,
    #[serde(default)]
    impressions: u64,
    #[serde(default)]
    clicks: u64,
    #[serde(default)]
    cost_micros: i64,
    #[serde(default)]
    conversions: f64,
    #[serde(default)]
    conversions_value: f64,
    #[serde(default)]
    all_conversions: f64,
    #[serde(default)]
    view_through_conversions: u64,
}

impl From<PerformanceRow> for CampaignRow {
    fn from(api: PerformanceRow) -> Self {
        let mut row = CampaignRow::new(
            api.data_source.unwrap_or(DataSource::GoogleAds),
            api.date,
            api.campaign_id,
            api.impressions,
            api.clicks,
            api.cost_micros as f64 / MICROS_PER_UNIT,
            api.conversions,
        )
        .with_campaign(
            api.campaign_name.unwrap_or_default(),
            api.campaign_status.unwrap_or_default(),
        );
        row.conversions_value = api.conversions_value;
        row.all_conversions = api.all_conversions;
        row.view_through_conversions = api.view_through_conversions;
        row
    }
}

// ============================================================================
// ReportingClient
// ============================================================================

/// HTTP client for the reporting API
#[derive(Debug, Clone)]
pub struct ReportingClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl ReportingClient {
    /// Creates a client for `base_url` with the given bearer token
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Creates a client from the `api` config section
    ///
    /// The token is read from the environment variable named by `token_env`.
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::MissingToken(config.token_env.clone()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches campaign rows for `customer` dated inside `range`
    ///
    /// Rows the API returns outside `range` are dropped.
    #[instrument(skip(self), fields(customer = %customer, range = %range))]
    pub async fn fetch_rows(
        &self,
        customer: &CustomerId,
        range: DateRange,
    ) -> Result<Vec<CampaignRow>, ApiError> {
        let url = format!(
            "{}/customers/{}/campaign-performance",
            self.base_url,
            customer.digits()
        );
        let start = range.start.format(DATE_FORMAT).to_string();
        let end = range.end.format(DATE_FORMAT).to_string();

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("start_date", start.as_str()), ("end_date", end.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, body));
        }

        let parsed: PerformanceResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let total = parsed.rows.len();
        let rows: Vec<CampaignRow> = parsed
            .rows
            .into_iter()
            .filter(|row| range.contains(row.date))
            .map(CampaignRow::from)
            .collect();
        if rows.len() < total {
            warn!(dropped = total - rows.len(), "API returned rows outside the requested range");
        }

        debug!(rows = rows.len(), "campaign performance fetched");
        Ok(rows)
    }
}

fn status_error(status: StatusCode, mut body: String) -> ApiError {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(body),
        StatusCode::NOT_FOUND => ApiError::NotFound(body),
        _ => ApiError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl IPerformanceSource for ReportingClient {
    async fn fetch(
        &self,
        customer: &CustomerId,
        range: DateRange,
    ) -> anyhow::Result<Vec<CampaignRow>> {
        self.fetch_rows(customer, range)
            .await
            .with_context(|| format!("fetching campaign performance for {customer} {range}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion_scales_cost_micros() {
        let api: PerformanceRow = serde_json::from_value(serde_json::json!({
            "date": "2025-09-01",
            "campaign_id": "987",
            "campaign_name": "Brand",
            "campaign_status": "ENABLED",
            "impressions": 1200,
            "clicks": 30,
            "cost_micros": 45_250_000,
            "conversions": 2.5,
            "view_through_conversions": 1
        }))
        .unwrap();

        let row = CampaignRow::from(api);
        assert_eq!(row.data_source, DataSource::GoogleAds);
        assert_eq!(row.cost, 45.25);
        assert_eq!(row.campaign_name, "Brand");
        assert_eq!(row.view_through_conversions, 1);
        assert_eq!(row.conversions_value, 0.0);
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "nope".into()),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, String::new()),
            ApiError::NotFound(_)
        ));
        match status_error(StatusCode::BAD_GATEWAY, "x".repeat(2000)) {
            ApiError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = ApiConfig {
            token_env: "ADSYNC_TEST_TOKEN_THAT_IS_NEVER_SET".into(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            ReportingClient::from_config(&config),
            Err(ApiError::MissingToken(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ReportingClient::with_base_url("t", "http://localhost:9000/");
        assert_eq!(client.base_url(), "http://localhost:9000");
    }
}
