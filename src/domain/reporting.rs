//! Experiment namespacing and the chart payloads handed to reporting sinks.

use crate::domain::errors::ForecastError;
use chrono::{DateTime, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

/// One experiment invocation. Every instrument of an orchestrator run reports
/// under the same run id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    run_id: String,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Result<Self, ForecastError> {
        let run_id = run_id.into();
        if run_id.trim().is_empty() {
            return Err(ForecastError::invalid("run id must not be empty"));
        }
        if run_id.contains('/') {
            return Err(ForecastError::invalid(format!(
                "run id must not contain '/': {}",
                run_id
            )));
        }
        Ok(Self { run_id })
    }

    /// `EXP-19-Oct-2026-(14:05:09)` style id derived from a timestamp.
    pub fn generate<Tz: TimeZone>(now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            run_id: format!("EXP-{}", now.format("%d-%b-%Y-(%H:%M:%S)")),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Rejects symbols that would not form a single path segment.
    pub fn namespace(&self, symbol: &str) -> Result<InstrumentNamespace, ForecastError> {
        if symbol.trim().is_empty() {
            return Err(ForecastError::invalid("symbol must not be empty"));
        }
        if symbol.contains('/') {
            return Err(ForecastError::invalid(format!(
                "symbol must not contain '/': {}",
                symbol
            )));
        }
        Ok(InstrumentNamespace {
            run_id: self.run_id.clone(),
            symbol: symbol.to_string(),
        })
    }
}

/// `{run_id}/{symbol}` prefix owned by exactly one instrument run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentNamespace {
    run_id: String,
    symbol: String,
}

impl InstrumentNamespace {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn root(&self) -> String {
        format!("{}/{}", self.run_id, self.symbol)
    }

    /// `{run_id}/{symbol}/{name}`
    pub fn field(&self, name: &str) -> String {
        format!("{}/{}/{}", self.run_id, self.symbol, name)
    }

    /// `{run_id}/{symbol}/{component}/{name}`
    pub fn path(&self, component: &str, name: &str) -> String {
        format!("{}/{}/{}/{}", self.run_id, self.symbol, component, name)
    }
}

/// A single dated point; `None` marks days where the series is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub label: String,
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn new(label: impl Into<String>, dates: &[NaiveDate], values: &[Option<f64>]) -> Self {
        Self {
            label: label.into(),
            points: dates
                .iter()
                .zip(values)
                .map(|(date, value)| ChartPoint {
                    date: *date,
                    value: *value,
                })
                .collect(),
        }
    }

    pub fn dense(label: impl Into<String>, dates: &[NaiveDate], values: &[f64]) -> Self {
        let values: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
        Self::new(label, dates, &values)
    }
}

/// Line chart description. Rendering is left to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ChartSeries>,
}

impl Chart {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: "Date".to_string(),
            y_label: "Stock Price ($)".to_string(),
            series: Vec::new(),
        }
    }

    pub fn with_series(mut self, series: ChartSeries) -> Self {
        self.series.push(series);
        self
    }
}
