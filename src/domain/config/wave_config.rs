//! Wave Orchestrator Configuration Value Object

use super::{ConfigError, require_positive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Rate-limit shaping for multi-instrument runs
///
/// # Invariants
///
/// - `width` > 0
/// - the cooldown is a whole number of seconds
/// - excluded symbols are stored trimmed and upper-cased
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Maximum instruments running at once
    pub width: usize,
    /// Pause after dispatching a wave, before collecting it
    pub cooldown_secs: u64,
    pub excluded: BTreeSet<String>,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            width: 4,
            cooldown_secs: 60,
            excluded: ["AMZN", "GOOG", "NVDA", "TSLA", "NKE"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl WaveConfig {
    pub fn new(
        width: usize,
        cooldown: Duration,
        excluded: impl IntoIterator<Item = String>,
    ) -> Result<Self, ConfigError> {
        if cooldown.subsec_nanos() != 0 {
            return Err(ConfigError::NotWholeSeconds {
                field: "wave_cooldown".to_string(),
                value: cooldown,
            });
        }
        let config = Self {
            width,
            cooldown_secs: cooldown.as_secs(),
            excluded: excluded
                .into_iter()
                .map(|s| normalize_symbol(&s))
                .filter(|s| !s.is_empty())
                .collect(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("wave_width", self.width)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn is_excluded(&self, symbol: &str) -> bool {
        self.excluded.contains(&normalize_symbol(symbol))
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
