//! Configuration domain module
//!
//! Validated value objects for the forecasting pipeline, the sequence model and
//! the wave orchestrator. Environment and CLI parsing live in `crate::config`.

pub mod model_config;
pub mod pipeline_config;
pub mod wave_config;

pub use model_config::ModelConfig;
pub use pipeline_config::PipelineConfig;
pub use wave_config::WaveConfig;

use thiserror::Error;

/// Error type for configuration value object validation
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value: {field} = {value}. Must be positive")]
    NotPositive { field: String, value: String },

    #[error("Invalid value: {field} = {value}. Must be in {range}")]
    OutOfRange {
        field: String,
        value: f64,
        range: String,
    },

    #[error("Invalid value: {field} = {value:?}. Must be a whole number of seconds")]
    NotWholeSeconds { field: String, value: std::time::Duration },
}

pub(crate) fn require_positive(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::NotPositive {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}
