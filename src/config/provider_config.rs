//! Upstream data provider configuration parsing from environment variables.

use super::EnvSource;
use crate::infrastructure::alpha_vantage::DEFAULT_BASE_URL;
use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Alpha Vantage credentials plus the optional offline CSV directory.
#[derive(Clone)]
pub struct ProviderEnvConfig {
    pub api_token: String,
    pub base_url: String,
    /// When set, `run` reads `{data_dir}/{SYMBOL}.csv` instead of calling the API
    pub data_dir: Option<PathBuf>,
    pub http_timeout_secs: u64,
}

impl Default for ProviderEnvConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: None,
            http_timeout_secs: 30,
        }
    }
}

// token stays out of logs
impl fmt::Debug for ProviderEnvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEnvConfig")
            .field(
                "api_token",
                &if self.api_token.is_empty() { "<unset>" } else { "<redacted>" },
            )
            .field("base_url", &self.base_url)
            .field("data_dir", &self.data_dir)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl ProviderEnvConfig {
    pub(crate) fn load(env: &EnvSource<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            api_token: env.get("ALPHA_VANTAGE_API_TOKEN").unwrap_or_default(),
            base_url: env.get("ALPHA_VANTAGE_BASE_URL").unwrap_or(defaults.base_url),
            data_dir: env.get("DATA_DIR").map(PathBuf::from),
            http_timeout_secs: env.parse("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
