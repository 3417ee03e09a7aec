//! Daily price series and the train/test split applied to it.

use crate::domain::errors::ForecastError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day as delivered by the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl DailyBar {
    /// Bar where only the close is known (open/high/low collapse onto it).
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Daily history of one instrument, most-recent-first as received.
///
/// # Invariants
///
/// - dates are strictly decreasing (no duplicates)
/// - every price and volume is finite
/// - never empty
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<DailyBar>,
}

impl PriceSeries {
    /// Validates the upstream ordering. A violation means the provider sent
    /// malformed data, so it is reported as a fetch failure.
    pub fn new(symbol: impl Into<String>, bars: Vec<DailyBar>) -> Result<Self, ForecastError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(ForecastError::fetch(symbol, "empty daily series"));
        }
        if let Some(pair) = bars.windows(2).find(|pair| pair[0].date <= pair[1].date) {
            return Err(ForecastError::fetch(
                symbol,
                format!(
                    "series not strictly most-recent-first ({} followed by {})",
                    pair[0].date, pair[1].date
                ),
            ));
        }
        if let Some(bar) = bars.iter().find(|bar| !bar.is_finite()) {
            return Err(ForecastError::fetch(
                symbol,
                format!("non-finite value in bar dated {}", bar.date),
            ));
        }
        Ok(Self { symbol, bars })
    }

    /// Builds a series from chronological (oldest-first) bars.
    pub fn from_chronological(
        symbol: impl Into<String>,
        mut bars: Vec<DailyBar>,
    ) -> Result<Self, ForecastError> {
        bars.reverse();
        Self::new(symbol, bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars in received order (most recent first).
    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    /// Oldest-first copy of the bars.
    pub fn chronological(&self) -> Vec<DailyBar> {
        self.bars.iter().rev().copied().collect()
    }

    pub fn chronological_closes(&self) -> Vec<f64> {
        self.bars.iter().rev().map(|bar| bar.close).collect()
    }

    pub fn chronological_dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().rev().map(|bar| bar.date).collect()
    }
}

/// Partition of a chronological series into a train prefix and a test suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub train_size: usize,
    pub test_size: usize,
}

impl Split {
    pub fn new(len: usize, train_ratio: f64) -> Result<Self, ForecastError> {
        if !(train_ratio > 0.0 && train_ratio < 1.0) {
            return Err(ForecastError::invalid(format!(
                "train ratio must be in (0, 1), got {}",
                train_ratio
            )));
        }
        let train_size = (train_ratio * len as f64).floor() as usize;
        let test_size = len - train_size;
        if train_size == 0 || test_size == 0 {
            return Err(ForecastError::insufficient("train/test split", 2, len));
        }
        Ok(Self {
            train_size,
            test_size,
        })
    }

    pub fn len(&self) -> usize {
        self.train_size + self.test_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn train<'a, T>(&self, values: &'a [T]) -> &'a [T] {
        &values[..self.train_size]
    }

    pub fn test<'a, T>(&self, values: &'a [T]) -> &'a [T] {
        &values[self.train_size..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn bars_desc(n: i64) -> Vec<DailyBar> {
        (0..n)
            .rev()
            .map(|i| DailyBar::from_close(day(i), 100.0 + i as f64))
            .collect()
    }

    #[test]
    fn test_series_chronological_is_reversed_copy() {
        let series = PriceSeries::new("AAPL", bars_desc(5)).unwrap();
        let chrono_bars = series.chronological();
        assert_eq!(chrono_bars.first().unwrap().date, day(0));
        assert_eq!(chrono_bars.last().unwrap().date, day(4));
        assert!(chrono_bars.windows(2).all(|w| w[0].date < w[1].date));
        // canonical order untouched
        assert_eq!(series.bars()[0].date, day(4));
        assert_eq!(series.chronological_closes(), vec![100.0, 101.0, 102.0, 103.0, 104.0]);
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let mut bars = bars_desc(3);
        bars[1].date = bars[0].date;
        let err = PriceSeries::new("AAPL", bars).unwrap_err();
        assert_eq!(err.kind(), "FetchError");
    }

    #[test]
    fn test_series_rejects_non_finite_values() {
        let mut bars = bars_desc(5);
        bars[0].close = f64::NAN;
        let err = PriceSeries::new("AAPL", bars).unwrap_err();
        assert_eq!(err.kind(), "FetchError");
        assert!(err.to_string().contains(&day(4).to_string()));

        let mut bars = bars_desc(5);
        bars[3].high = f64::INFINITY;
        assert!(PriceSeries::new("AAPL", bars).is_err());
    }

    #[test]
    fn test_series_rejects_empty() {
        assert!(PriceSeries::new("AAPL", vec![]).is_err());
    }

    #[test]
    fn test_split_sizes_cover_series() {
        let split = Split::new(200, 0.8).unwrap();
        assert_eq!(split.train_size, 160);
        assert_eq!(split.test_size, 40);
        assert_eq!(split.len(), 200);

        let split = Split::new(7, 0.8).unwrap();
        assert_eq!(split.train_size + split.test_size, 7);
    }

    #[test]
    fn test_split_slices_train_before_test() {
        let values: Vec<i32> = (0..10).collect();
        let split = Split::new(values.len(), 0.8).unwrap();
        assert_eq!(split.train(&values), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(split.test(&values), &[8, 9]);
    }

    #[test]
    fn test_split_rejects_degenerate_inputs() {
        assert!(matches!(
            Split::new(1, 0.8),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert!(matches!(
            Split::new(10, 1.0),
            Err(ForecastError::InvalidInput { .. })
        ));
    }
}
