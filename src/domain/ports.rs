use crate::domain::errors::ForecastError;
use crate::domain::series::PriceSeries;
use crate::domain::reporting::Chart;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Upstream source of daily history.
#[async_trait]
pub trait DailySeriesProvider: Send + Sync {
    /// Returns at most `max_rows` of the most recent daily bars, most-recent-first.
    /// Any network or parse failure is a `ForecastError::Fetch`.
    async fn fetch_daily_series(
        &self,
        symbol: &str,
        max_rows: usize,
    ) -> Result<PriceSeries, ForecastError>;
}

/// Write-only experiment tracking sink. Paths are already namespaced by the
/// caller. Implementations must accept concurrent appends from several workers.
#[async_trait]
pub trait ReportingSink: Send + Sync {
    async fn report_scalar(&self, path: &str, value: f64) -> Result<()>;
    async fn report_params(&self, path: &str, params: &BTreeMap<String, Value>) -> Result<()>;
    async fn report_text(&self, path: &str, text: &str) -> Result<()>;
    async fn report_image(&self, path: &str, chart: &Chart) -> Result<()>;
}
