//! Moving-average baselines.
//!
//! A baseline is a non-trained trend statistic used as a naive forecast for the
//! close of the same day. Each evaluation returns a new [`TrendFrame`] rather
//! than appending columns to the canonical series.

use crate::application::instrument_reporter::InstrumentReporter;
use crate::domain::errors::ForecastError;
use crate::domain::metrics::Scores;
use crate::domain::reporting::{Chart, ChartSeries};
use crate::domain::series::{PriceSeries, Split};
use chrono::NaiveDate;
use serde::Serialize;
use ta::Next;
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EstimatorKind {
    Sma,
    Ema,
}

impl EstimatorKind {
    /// Reporting component name.
    pub fn component(&self) -> &'static str {
        match self {
            EstimatorKind::Sma => "SMA",
            EstimatorKind::Ema => "EMA",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EstimatorKind::Sma => "Simple MA",
            EstimatorKind::Ema => "Exp MA",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            EstimatorKind::Sma => "Simple Moving Averages",
            EstimatorKind::Ema => "Exponential Moving Averages",
        }
    }

    pub fn column_name(&self, window_size: usize) -> String {
        match self {
            EstimatorKind::Sma => format!("{}day", window_size),
            EstimatorKind::Ema => format!("{}day_EMA", window_size),
        }
    }
}

/// Trailing mean of `window_size` closes ending at each day (inclusive).
/// The first `window_size - 1` days are undefined.
pub fn simple_moving_average(
    closes: &[f64],
    window_size: usize,
) -> Result<Vec<Option<f64>>, ForecastError> {
    let mut sma = SimpleMovingAverage::new(window_size).map_err(|e| {
        ForecastError::invalid(format!("SMA window {}: {:?}", window_size, e))
    })?;

    Ok(closes
        .iter()
        .enumerate()
        .map(|(idx, close)| {
            let value = sma.next(*close);
            (idx + 1 >= window_size).then_some(value)
        })
        .collect())
}

/// Exponentially weighted mean with `alpha = 2 / (window_size + 1)`, seeded by
/// the first close, without bias correction. Defined on every day.
pub fn exponential_moving_average(
    closes: &[f64],
    window_size: usize,
) -> Result<Vec<Option<f64>>, ForecastError> {
    let mut ema = ExponentialMovingAverage::new(window_size).map_err(|e| {
        ForecastError::invalid(format!("EMA window {}: {:?}", window_size, e))
    })?;

    Ok(closes.iter().map(|close| Some(ema.next(*close))).collect())
}

/// Working copy of the chronological series with the trend columns attached.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendFrame {
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
    pub trend: Vec<Option<f64>>,
    /// Long SMA for visual context only
    pub context: Vec<Option<f64>>,
    pub trend_column: String,
    pub context_column: String,
}

impl TrendFrame {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// `(close, trend)` pairs of test rows whose trend is defined.
    pub fn scored_pairs(&self, split: Split) -> (Vec<f64>, Vec<f64>) {
        self.close
            .iter()
            .zip(&self.trend)
            .skip(split.train_size)
            .filter_map(|(close, trend)| trend.map(|t| (*close, t)))
            .unzip()
    }
}

/// Scores the trend column against closes on the test rows only.
pub fn score(frame: &TrendFrame, split: Split) -> Result<Scores, ForecastError> {
    if frame.len() != split.len() {
        return Err(ForecastError::invalid(format!(
            "frame has {} rows but split covers {}",
            frame.len(),
            split.len()
        )));
    }
    let (actual, trend) = frame.scored_pairs(split);
    if actual.is_empty() {
        return Err(ForecastError::insufficient(
            format!("{} scoring", frame.trend_column),
            1,
            0,
        ));
    }
    Scores::compute(&actual, &trend)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaselineResult {
    pub kind: EstimatorKind,
    pub window_size: usize,
    pub frame: TrendFrame,
    pub scores: Scores,
}

impl BaselineResult {
    pub fn chart(&self) -> Chart {
        Chart::new(self.kind.title())
            .with_series(ChartSeries::dense("close", &self.frame.dates, &self.frame.close))
            .with_series(ChartSeries::new(
                self.frame.trend_column.clone(),
                &self.frame.dates,
                &self.frame.trend,
            ))
            .with_series(ChartSeries::new(
                self.frame.context_column.clone(),
                &self.frame.dates,
                &self.frame.context,
            ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselineEstimator {
    kind: EstimatorKind,
    window_size: usize,
    context_window: usize,
}

impl BaselineEstimator {
    pub fn new(kind: EstimatorKind, window_size: usize, context_window: usize) -> Self {
        Self {
            kind,
            window_size,
            context_window,
        }
    }

    pub fn sma(window_size: usize, context_window: usize) -> Self {
        Self::new(EstimatorKind::Sma, window_size, context_window)
    }

    pub fn ema(window_size: usize, context_window: usize) -> Self {
        Self::new(EstimatorKind::Ema, window_size, context_window)
    }

    pub fn kind(&self) -> EstimatorKind {
        self.kind
    }

    pub fn trend(&self, closes: &[f64]) -> Result<Vec<Option<f64>>, ForecastError> {
        match self.kind {
            EstimatorKind::Sma => simple_moving_average(closes, self.window_size),
            EstimatorKind::Ema => exponential_moving_average(closes, self.window_size),
        }
    }

    pub fn frame(&self, series: &PriceSeries) -> Result<TrendFrame, ForecastError> {
        let close = series.chronological_closes();
        let trend = self.trend(&close)?;
        let context = simple_moving_average(&close, self.context_window)?;

        Ok(TrendFrame {
            dates: series.chronological_dates(),
            trend_column: self.kind.column_name(self.window_size),
            context_column: format!("{}day", self.context_window),
            close,
            trend,
            context,
        })
    }

    pub fn evaluate(&self, series: &PriceSeries, split: Split) -> Result<BaselineResult, ForecastError> {
        let frame = self.frame(series)?;
        let scores = score(&frame, split)?;
        debug!(
            "BaselineEstimator [{}]: {} rmse={:.4} over {} rows",
            series.symbol(),
            frame.trend_column,
            scores.rmse,
            scores.scored_rows
        );

        Ok(BaselineResult {
            kind: self.kind,
            window_size: self.window_size,
            frame,
            scores,
        })
    }

    pub async fn report(&self, result: &BaselineResult, reporter: &InstrumentReporter) {
        let component = self.kind.component();
        reporter
            .image(
                component,
                &format!("Plot of Stock Predictions with {}", self.kind.label()),
                &result.chart(),
            )
            .await;
        reporter.scores(component, &result.scores).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::DailyBar;

    fn series_from(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| DailyBar::from_close(start + chrono::Duration::days(i as i64), *c))
            .collect();
        PriceSeries::from_chronological("TEST", bars).unwrap()
    }

    #[test]
    fn test_sma_worked_example() {
        let closes: Vec<f64> = (10..20).map(|v| v as f64).collect();
        let sma = simple_moving_average(&closes, 3).unwrap();
        assert_eq!(sma[0], None);
        assert_eq!(sma[1], None);
        assert!((sma[9].unwrap() - 18.0).abs() < 1e-12);
    }

    #[test]
    fn test_sma_matches_trailing_mean() {
        let closes = vec![3.0, 8.0, 1.0, 9.0, 4.0, 7.0, 2.0];
        let window = 4;
        let sma = simple_moving_average(&closes, window).unwrap();
        for t in 0..closes.len() {
            if t + 1 < window {
                assert!(sma[t].is_none());
            } else {
                let expected = closes[t + 1 - window..=t].iter().sum::<f64>() / window as f64;
                assert!((sma[t].unwrap() - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_sma_longer_than_series_is_all_undefined() {
        let sma = simple_moving_average(&[1.0, 2.0], 200).unwrap();
        assert!(sma.iter().all(Option::is_none));
    }

    #[test]
    fn test_ema_seeded_by_first_close() {
        let closes = vec![10.0, 20.0, 30.0];
        let ema = exponential_moving_average(&closes, 3).unwrap();
        // alpha = 0.5
        assert!((ema[0].unwrap() - 10.0).abs() < 1e-12);
        assert!((ema[1].unwrap() - 15.0).abs() < 1e-12);
        assert!((ema[2].unwrap() - 22.5).abs() < 1e-12);
    }

    #[test]
    fn test_ema_with_huge_window_stays_within_prior_range() {
        let closes = vec![50.0, 52.0, 48.0, 51.0, 49.0, 53.0];
        let ema = exponential_moving_average(&closes, 100_000).unwrap();
        for (t, value) in ema.iter().enumerate() {
            let value = value.unwrap();
            let prior = &closes[..=t];
            let lo = prior.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = prior.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert!(value >= lo - 1e-9 && value <= hi + 1e-9);
            assert!((value - closes[0]).abs() < 0.01);
        }
    }

    #[test]
    fn test_zero_window_is_invalid() {
        assert!(matches!(
            simple_moving_average(&[1.0], 0),
            Err(ForecastError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_score_uses_test_rows_only() {
        let closes: Vec<f64> = (10..20).map(|v| v as f64).collect();
        let series = series_from(&closes);
        let split = Split::new(series.len(), 0.8).unwrap();
        let result = BaselineEstimator::sma(3, 200).evaluate(&series, split).unwrap();

        // test rows 8 and 9: closes 18, 19 vs SMA 17, 18
        assert_eq!(result.scores.scored_rows, 2);
        assert!((result.scores.rmse - 1.0).abs() < 1e-12);
        assert_eq!(result.frame.trend_column, "3day");
        assert!(result.frame.context.iter().all(Option::is_none));
    }

    #[test]
    fn test_evaluate_does_not_touch_series() {
        let series = series_from(&[5.0, 6.0, 7.0, 8.0, 9.0]);
        let before = series.clone();
        let split = Split::new(series.len(), 0.6).unwrap();
        BaselineEstimator::ema(2, 200).evaluate(&series, split).unwrap();
        assert_eq!(series, before);
    }

    #[test]
    fn test_no_defined_trend_in_test_rows_is_insufficient() {
        let series = series_from(&[5.0, 6.0, 7.0, 8.0, 9.0]);
        let split = Split::new(series.len(), 0.6).unwrap();
        let err = BaselineEstimator::sma(50, 200).evaluate(&series, split).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { .. }));
    }

    #[test]
    fn test_chart_carries_three_columns() {
        let closes: Vec<f64> = (1..=12).map(|v| v as f64).collect();
        let series = series_from(&closes);
        let split = Split::new(series.len(), 0.75).unwrap();
        let result = BaselineEstimator::ema(3, 5).evaluate(&series, split).unwrap();
        let chart = result.chart();
        let labels: Vec<&str> = chart.series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["close", "3day_EMA", "5day"]);
        assert_eq!(chart.title, "Exponential Moving Averages");
    }
}
