use crate::domain::errors::ForecastError;
use crate::domain::ports::DailySeriesProvider;
use crate::domain::series::PriceSeries;
use crate::infrastructure::daily_csv::parse_daily_csv;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// The compact output size returns the latest 100 days.
const COMPACT_ROWS: usize = 100;

/// JSON keys the upstream uses in place of CSV when it refuses a request.
const NOTICE_KEYS: [&str; 3] = ["Note", "Information", "Error Message"];

/// Daily history from the Alpha Vantage `TIME_SERIES_DAILY` endpoint.
pub struct AlphaVantageProvider {
    client: Client,
    base_url: String,
    api_token: String,
}

impl AlphaVantageProvider {
    pub fn new(client: Client, base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }

    pub fn output_size(max_rows: usize) -> &'static str {
        if max_rows <= COMPACT_ROWS {
            "compact"
        } else {
            "full"
        }
    }

    /// Raw CSV body for `symbol`. Throttling and error notices sent as JSON
    /// are turned into errors carrying the notice text.
    pub async fn download_csv(&self, symbol: &str, max_rows: usize) -> Result<String> {
        debug!(
            "AlphaVantageProvider: fetching {} (outputsize={})",
            symbol,
            Self::output_size(max_rows)
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", Self::output_size(max_rows)),
                ("datatype", "csv"),
                ("apikey", self.api_token.as_str()),
            ])
            .send()
            .await
            .context("Failed to reach Alpha Vantage")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "AlphaVantageProvider: API error {} for {}: {}",
                status, symbol, error_text
            );
            bail!("Alpha Vantage API error ({}): {}", status, error_text);
        }

        let body = response
            .text()
            .await
            .context("Failed to read Alpha Vantage response body")?;
        check_notice(&body)?;
        Ok(body)
    }
}

fn check_notice(body: &str) -> Result<()> {
    if !body.trim_start().starts_with('{') {
        return Ok(());
    }
    let json: Value = serde_json::from_str(body).context("Unexpected non-CSV response")?;
    for key in NOTICE_KEYS {
        if let Some(text) = json.get(key).and_then(Value::as_str) {
            bail!("{}: {}", key, text);
        }
    }
    bail!("Unexpected JSON response: {}", body.trim())
}

#[async_trait]
impl DailySeriesProvider for AlphaVantageProvider {
    async fn fetch_daily_series(&self, symbol: &str, max_rows: usize) -> Result<PriceSeries, ForecastError> {
        let body = self
            .download_csv(symbol, max_rows)
            .await
            .map_err(|e| ForecastError::fetch(symbol, format!("{:#}", e)))?;
        parse_daily_csv(symbol, &body, max_rows)
    }
}
