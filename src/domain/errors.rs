use thiserror::Error;

/// Errors raised by the forecasting core.
///
/// Every variant is scoped to a single instrument run: the orchestrator turns
/// them into a per-instrument status and never propagates them further.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Failed to fetch daily series for {symbol}: {reason}")]
    Fetch { symbol: String, reason: String },

    #[error("Insufficient data for {stage}: need {needed} points, have {available}")]
    InsufficientData {
        stage: String,
        needed: usize,
        available: usize,
    },

    #[error("Metric {metric} is undefined: {reason}")]
    MetricUndefined { metric: String, reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl ForecastError {
    pub fn fetch(symbol: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }

    pub fn insufficient(stage: impl Into<String>, needed: usize, available: usize) -> Self {
        Self::InsufficientData {
            stage: stage.into(),
            needed,
            available,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Short machine-friendly tag, used in status markers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "FetchError",
            Self::InsufficientData { .. } => "InsufficientData",
            Self::MetricUndefined { .. } => "MetricUndefined",
            Self::InvalidInput { .. } => "InvalidInput",
        }
    }
}
