//! Upstream daily CSV layout: `timestamp,open,high,low,close,volume`,
//! most recent day first. Extra columns are ignored.

use crate::domain::errors::ForecastError;
use crate::domain::series::{DailyBar, PriceSeries};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Serialize, Deserialize)]
struct DailyRow {
    timestamp: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<DailyRow> for DailyBar {
    fn from(row: DailyRow) -> Self {
        DailyBar {
            date: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

impl From<&DailyBar> for DailyRow {
    fn from(bar: &DailyBar) -> Self {
        DailyRow {
            timestamp: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

/// Parses at most `max_rows` leading rows. Any malformed row fails the whole
/// series.
pub fn parse_daily_csv(symbol: &str, body: &str, max_rows: usize) -> Result<PriceSeries, ForecastError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let mut bars = Vec::new();
    for (idx, row) in reader.deserialize::<DailyRow>().take(max_rows).enumerate() {
        let row = row.map_err(|e| ForecastError::fetch(symbol, format!("CSV row {}: {}", idx + 1, e)))?;
        bars.push(DailyBar::from(row));
    }

    PriceSeries::new(symbol, bars)
}

/// Writes the series in the upstream layout, most recent first.
pub fn write_daily_csv<W: Write>(writer: W, series: &PriceSeries) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    for bar in series.bars() {
        writer
            .serialize(DailyRow::from(bar))
            .with_context(|| format!("Failed to write CSV row for {}", series.symbol()))?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}
