//! Configuration module for the forecasting runner.
//!
//! Values are layered: built-in defaults, then environment variables (usually
//! from `.env`), then an optional TOML file with `[pipeline]`, `[model]` and
//! `[waves]` sections, then CLI flags applied by the binary.

mod orchestrator_env_config;
mod pipeline_env_config;
mod provider_config;
mod reporting_config;

pub use provider_config::ProviderEnvConfig;
pub use reporting_config::ReportingEnvConfig;

use crate::domain::config::wave_config::normalize_symbol;
use crate::domain::config::{ModelConfig, PipelineConfig, WaveConfig};
use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

/// Key/value source the loaders read from. Production reads the process
/// environment; tests pass a closure.
pub(crate) struct EnvSource<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> EnvSource<'a> {
    pub(crate) fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self { lookup }
    }

    /// Trimmed value; blank counts as unset.
    pub(crate) fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub(crate) fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }

    pub(crate) fn parse_opt<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| anyhow!("Failed to parse {}={}: {}", key, raw, e))
            })
            .transpose()
    }

    pub(crate) fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(default)
    }
}

/// Comma-separated symbol list, normalized, blanks dropped.
pub fn split_symbols(list: &str) -> Vec<String> {
    list.split(',')
        .map(normalize_symbol)
        .filter(|s| !s.is_empty())
        .collect()
}

/// One symbol per line. Blank lines and `#` comments are skipped.
pub fn parse_symbols_file(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .map(normalize_symbol)
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn read_symbols_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read symbols file {}", path.display()))?;
    Ok(parse_symbols_file(&text))
}

/// Full runner configuration.
#[derive(Debug, Clone, Default)]
pub struct ForecastConfig {
    pub provider: ProviderEnvConfig,
    pub pipeline: PipelineConfig,
    pub model: ModelConfig,
    pub waves: WaveConfig,
    pub reporting: ReportingEnvConfig,
}

impl ForecastConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvSource::new(&lookup);
        let config = Self {
            provider: ProviderEnvConfig::load(&env).context("Failed to load provider config")?,
            pipeline: pipeline_env_config::load_pipeline(&env)
                .context("Failed to load pipeline config")?,
            model: pipeline_env_config::load_model(&env).context("Failed to load model config")?,
            waves: orchestrator_env_config::load_waves(&env)
                .context("Failed to load orchestrator config")?,
            reporting: ReportingEnvConfig::load(&env),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline
            .validate()
            .map_err(|e| anyhow!("Invalid pipeline config: {}", e))?;
        self.model
            .validate()
            .map_err(|e| anyhow!("Invalid model config: {}", e))?;
        self.waves
            .validate()
            .map_err(|e| anyhow!("Invalid wave config: {}", e))?;
        Ok(())
    }

    /// Overrides individual keys from a TOML document. Keys not present keep
    /// their current value.
    pub fn apply_overlay(&mut self, text: &str) -> Result<()> {
        let overlay: toml::Table = text.parse().context("Failed to parse config overlay")?;
        for (section, patch) in overlay {
            match section.as_str() {
                "pipeline" => self.pipeline = merge_section(&self.pipeline, &section, patch)?,
                "model" => self.model = merge_section(&self.model, &section, patch)?,
                "waves" => {
                    let mut waves: WaveConfig = merge_section(&self.waves, &section, patch)?;
                    waves.excluded = waves.excluded.iter().map(|s| normalize_symbol(s)).collect();
                    self.waves = waves;
                }
                other => bail!("Unknown config section [{}]", other),
            }
        }
        self.validate()
    }

    pub fn apply_overlay_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        self.apply_overlay(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

fn merge_section<T>(current: &T, section: &str, patch: toml::Value) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let toml::Value::Table(patch) = patch else {
        bail!("[{}] must be a table", section);
    };
    let mut merged = match toml::Value::try_from(current)
        .with_context(|| format!("Failed to serialize [{}]", section))?
    {
        toml::Value::Table(table) => table,
        _ => bail!("[{}] is not a table", section),
    };
    for (key, value) in patch {
        merged.insert(key, value);
    }
    toml::Value::Table(merged)
        .try_into()
        .with_context(|| format!("Invalid values in [{}]", section))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ForecastConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ForecastConfig::from_lookup(move |k| vars.get(k).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.pipeline.lookback_rows, 200);
        assert_eq!(config.model.epochs, 15);
        assert_eq!(config.waves.width, 4);
        assert_eq!(config.waves.cooldown_secs, 60);
        assert!(config.waves.is_excluded("nke"));
        assert!(!config.reporting.stdout);
    }

    #[test]
    fn test_env_overrides_and_validation() {
        let config = from_pairs(&[("WAVE_WIDTH", "2"), ("LOOKBACK_ROWS", "500")]).unwrap();
        assert_eq!(config.waves.width, 2);
        assert_eq!(config.pipeline.lookback_rows, 500);

        let err = from_pairs(&[("WAVE_WIDTH", "0")]).unwrap_err();
        assert!(err.to_string().contains("wave config"));
    }

    #[test]
    fn test_overlay_keeps_unset_keys() {
        let mut config = from_pairs(&[("EPOCHS", "7")]).unwrap();
        config
            .apply_overlay(
                r#"
                [model]
                batch_size = 32
                seed = 9

                [waves]
                excluded = ["ibm"]
                "#,
            )
            .unwrap();
        assert_eq!(config.model.epochs, 7);
        assert_eq!(config.model.batch_size, 32);
        assert_eq!(config.model.seed, Some(9));
        assert!(config.waves.is_excluded("IBM"));
        assert!(!config.waves.is_excluded("AMZN"));
    }

    #[test]
    fn test_overlay_rejects_unknown_section_and_bad_values() {
        let mut config = ForecastConfig::default();
        assert!(config.apply_overlay("[broker]\nkey = 1").is_err());
        assert!(config.apply_overlay("[pipeline]\ntrain_ratio = 1.5").is_err());
    }

    #[test]
    fn test_symbol_lists() {
        assert_eq!(split_symbols(" aapl, ,msft"), vec!["AAPL", "MSFT"]);
        assert_eq!(
            parse_symbols_file("AAPL\n\n# comment\nibm  # blue\n"),
            vec!["AAPL", "IBM"]
        );
    }
}
