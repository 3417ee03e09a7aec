//! Wave orchestrator settings parsed from environment variables.

use super::EnvSource;
use crate::domain::config::WaveConfig;
use anyhow::Result;

pub(crate) fn load_waves(env: &EnvSource<'_>) -> Result<WaveConfig> {
    let defaults = WaveConfig::default();
    let excluded = match env.get("EXCLUDED_SYMBOLS") {
        Some(list) => super::split_symbols(&list),
        None => defaults.excluded.iter().cloned().collect(),
    };
    Ok(WaveConfig {
        width: env.parse("WAVE_WIDTH", defaults.width)?,
        cooldown_secs: env.parse("WAVE_COOLDOWN_SECS", defaults.cooldown_secs)?,
        excluded: excluded.into_iter().collect(),
    })
}
