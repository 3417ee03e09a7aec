use crate::domain::errors::ForecastError;
use crate::domain::ports::{DailySeriesProvider, ReportingSink};
use crate::domain::reporting::Chart;
use crate::domain::series::{DailyBar, PriceSeries};
use crate::infrastructure::reporting::ReportPayload;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Deterministic daily bars, most recent first, starting on 2023-01-02.
/// Closes follow a gentle upward drift with a sine wobble and stay positive.
pub fn synthetic_bars(n: usize, base_price: f64) -> Vec<DailyBar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap_or_default();
    (0..n)
        .rev()
        .map(|i| {
            let close = base_price + 3.0 * (i as f64 * 0.2).sin() + 0.05 * i as f64;
            let mut bar = DailyBar::from_close(start + chrono::Duration::days(i as i64), close);
            bar.open = close - 0.5;
            bar.high = close + 1.0;
            bar.low = close - 1.0;
            bar.volume = 1_000.0 + i as f64;
            bar
        })
        .collect()
}

/// In-memory provider with canned series and canned failures per symbol.
#[derive(Default)]
pub struct MockDailySeriesProvider {
    series: HashMap<String, Vec<DailyBar>>,
    failures: HashMap<String, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockDailySeriesProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// `bars` must be most recent first, as the real upstream delivers them.
    pub fn with_series(mut self, symbol: &str, bars: Vec<DailyBar>) -> Self {
        self.series.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_failure(mut self, symbol: &str, reason: &str) -> Self {
        self.failures.insert(symbol.to_string(), reason.to_string());
        self
    }

    /// Holds every fetch open for `delay`, which makes overlap observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Highest number of fetches that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DailySeriesProvider for MockDailySeriesProvider {
    async fn fetch_daily_series(&self, symbol: &str, max_rows: usize) -> Result<PriceSeries, ForecastError> {
        match self.calls.lock() {
            Ok(mut guard) => guard.push(symbol.to_string()),
            Err(poisoned) => poisoned.into_inner().push(symbol.to_string()),
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        debug!("MockDailySeriesProvider: fetch {} (max_rows={})", symbol, max_rows);

        if let Some(reason) = self.failures.get(symbol) {
            return Err(ForecastError::fetch(symbol, reason));
        }
        match self.series.get(symbol) {
            Some(bars) => PriceSeries::new(symbol, bars.iter().take(max_rows).copied().collect()),
            None => Err(ForecastError::fetch(symbol, "unknown symbol")),
        }
    }
}

/// Sink keeping every record in memory, in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(String, ReportPayload)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, path: &str, payload: ReportPayload) {
        match self.records.lock() {
            Ok(mut guard) => guard.push((path.to_string(), payload)),
            Err(poisoned) => poisoned.into_inner().push((path.to_string(), payload)),
        }
    }

    pub fn records(&self) -> Vec<(String, ReportPayload)> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn paths(&self) -> Vec<String> {
        self.records().into_iter().map(|(path, _)| path).collect()
    }

    pub fn records_at(&self, path: &str) -> Vec<ReportPayload> {
        self.records()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn scalars(&self, path: &str) -> Vec<f64> {
        self.records_at(path)
            .into_iter()
            .filter_map(|payload| match payload {
                ReportPayload::Scalar(v) => Some(v),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ReportingSink for RecordingSink {
    async fn report_scalar(&self, path: &str, value: f64) -> Result<()> {
        self.push(path, ReportPayload::Scalar(value));
        Ok(())
    }

    async fn report_params(&self, path: &str, params: &BTreeMap<String, Value>) -> Result<()> {
        self.push(path, ReportPayload::Params(params.clone()));
        Ok(())
    }

    async fn report_text(&self, path: &str, text: &str) -> Result<()> {
        self.push(path, ReportPayload::Text(text.to_string()));
        Ok(())
    }

    async fn report_image(&self, path: &str, chart: &Chart) -> Result<()> {
        self.push(path, ReportPayload::Image(chart.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_bars_are_most_recent_first() {
        let bars = synthetic_bars(10, 20.0);
        assert_eq!(bars.len(), 10);
        assert!(bars.windows(2).all(|w| w[0].date > w[1].date));
        assert!(bars.iter().all(|b| b.close > 0.0));
    }

    #[test]
    fn test_recording_sink_keeps_arrival_order() {
        let sink = RecordingSink::new();
        tokio_test::block_on(async {
            tokio_test::assert_ok!(sink.report_scalar("R/A/x", 1.0).await);
            tokio_test::assert_ok!(sink.report_text("R/A/y", "t").await);
            tokio_test::assert_ok!(sink.report_scalar("R/A/x", 2.0).await);
        });
        assert_eq!(sink.paths(), vec!["R/A/x", "R/A/y", "R/A/x"]);
        assert_eq!(sink.scalars("R/A/x"), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_provider_truncates_and_fails() {
        let provider = MockDailySeriesProvider::new()
            .with_series("IBM", synthetic_bars(30, 50.0))
            .with_failure("BAD", "boom");

        let series = provider.fetch_daily_series("IBM", 10).await.unwrap();
        assert_eq!(series.len(), 10);
        assert_eq!(series.bars()[0], synthetic_bars(30, 50.0)[0]);

        assert_eq!(provider.fetch_daily_series("BAD", 10).await.unwrap_err().kind(), "FetchError");
        assert!(provider.fetch_daily_series("NONE", 10).await.is_err());
        assert_eq!(provider.calls(), vec!["IBM", "BAD", "NONE"]);
    }
}
