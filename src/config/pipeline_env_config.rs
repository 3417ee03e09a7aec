//! Pipeline and sequence model knobs parsed from environment variables.

use super::EnvSource;
use crate::domain::config::{ModelConfig, PipelineConfig};
use anyhow::Result;

pub(crate) fn load_pipeline(env: &EnvSource<'_>) -> Result<PipelineConfig> {
    let defaults = PipelineConfig::default();
    Ok(PipelineConfig {
        lookback_rows: env.parse("LOOKBACK_ROWS", defaults.lookback_rows)?,
        train_ratio: env.parse("TRAIN_RATIO", defaults.train_ratio)?,
        sma_window: env.parse("SMA_WINDOW", defaults.sma_window)?,
        ema_window: env.parse("EMA_WINDOW", defaults.ema_window)?,
        context_sma_window: env.parse("CONTEXT_SMA_WINDOW", defaults.context_sma_window)?,
    })
}

pub(crate) fn load_model(env: &EnvSource<'_>) -> Result<ModelConfig> {
    let defaults = ModelConfig::default();
    Ok(ModelConfig {
        window_size: env.parse("WINDOW_SIZE", defaults.window_size)?,
        hidden_units: env.parse("HIDDEN_UNITS", defaults.hidden_units)?,
        epochs: env.parse("EPOCHS", defaults.epochs)?,
        batch_size: env.parse("BATCH_SIZE", defaults.batch_size)?,
        learning_rate: env.parse("LEARNING_RATE", defaults.learning_rate)?,
        validation_split: env.parse("VALIDATION_SPLIT", defaults.validation_split)?,
        seed: env.parse_opt("SEED")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_overrides() {
        let lookup = |k: &str| match k {
            "EPOCHS" => Some("3".to_string()),
            "SEED" => Some("42".to_string()),
            _ => None,
        };
        let model = load_model(&EnvSource::new(&lookup)).unwrap();
        assert_eq!(model.epochs, 3);
        assert_eq!(model.seed, Some(42));
        assert_eq!(model.window_size, 50);
    }

    #[test]
    fn test_unparsable_value_is_error() {
        let lookup = |k: &str| (k == "TRAIN_RATIO").then(|| "eighty".to_string());
        let err = load_pipeline(&EnvSource::new(&lookup)).unwrap_err();
        assert!(err.to_string().contains("TRAIN_RATIO"));
    }
}
