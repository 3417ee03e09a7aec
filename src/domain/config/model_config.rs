//! Sequence Model Configuration Value Object
//!
//! Fixed architecture and training knobs for the recurrent forecaster.

use super::{ConfigError, require_positive};
use serde::{Deserialize, Serialize};

/// Recurrent forecaster configuration
///
/// # Invariants
///
/// - `window_size`, `hidden_units`, `epochs`, `batch_size` are > 0
/// - `learning_rate` is finite and > 0
/// - `validation_split` is in [0.0, 1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Days of history per input window (also the windowing offset)
    pub window_size: usize,
    /// Width of each of the two LSTM layers
    pub hidden_units: usize,
    pub epochs: usize,
    pub batch_size: usize,
    /// Adam step size
    pub learning_rate: f64,
    /// Fraction of training windows held out (from the end) for validation
    pub validation_split: f64,
    /// Seed for weight initialisation and shuffling. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            hidden_units: 50,
            epochs: 15,
            batch_size: 20,
            learning_rate: 0.001,
            validation_split: 0.1,
            seed: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("window_size", self.window_size)?;
        require_positive("hidden_units", self.hidden_units)?;
        require_positive("epochs", self.epochs)?;
        require_positive("batch_size", self.batch_size)?;

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ConfigError::OutOfRange {
                field: "validation_split".to_string(),
                value: self.validation_split,
                range: "[0.0, 1.0)".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ModelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_size, 50);
        assert_eq!(config.epochs, 15);
        assert_eq!(config.batch_size, 20);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = ModelConfig {
            batch_size: 0,
            ..ModelConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::NotPositive {
                field: "batch_size".to_string(),
                value: "0".to_string(),
            }
        );
    }

    #[test]
    fn test_validation_split_range() {
        let config = ModelConfig {
            validation_split: 1.0,
            ..ModelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }
}
