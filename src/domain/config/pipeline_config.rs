//! Instrument Pipeline Configuration Value Object

use super::{ConfigError, require_positive};
use serde::{Deserialize, Serialize};

/// Per-instrument pipeline configuration
///
/// # Invariants
///
/// - `lookback_rows` and every window size are > 0
/// - `train_ratio` is in (0.0, 1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of most recent daily rows fetched per instrument
    pub lookback_rows: usize,
    pub train_ratio: f64,
    pub sma_window: usize,
    pub ema_window: usize,
    /// Long SMA drawn next to each baseline for context; never scored
    pub context_sma_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_rows: 200,
            train_ratio: 0.8,
            sma_window: 50,
            ema_window: 50,
            context_sma_window: 200,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("lookback_rows", self.lookback_rows)?;
        require_positive("sma_window", self.sma_window)?;
        require_positive("ema_window", self.ema_window)?;
        require_positive("context_sma_window", self.context_sma_window)?;

        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "train_ratio".to_string(),
                value: self.train_ratio,
                range: "(0.0, 1.0)".to_string(),
            });
        }
        Ok(())
    }
}
