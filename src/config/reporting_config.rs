//! Reporting sink configuration parsing from environment variables.

use super::EnvSource;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ReportingEnvConfig {
    /// Directory receiving one `{run_id}.jsonl` file per run
    pub report_dir: PathBuf,
    /// Print records to stdout instead of writing a file
    pub stdout: bool,
}

impl Default for ReportingEnvConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("runs"),
            stdout: false,
        }
    }
}

impl ReportingEnvConfig {
    pub(crate) fn load(env: &EnvSource<'_>) -> Self {
        let defaults = Self::default();
        Self {
            report_dir: env
                .get("REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_dir),
            stdout: env.flag("REPORT_STDOUT", defaults.stdout),
        }
    }

    pub fn report_path(&self, run_id: &str) -> PathBuf {
        self.report_dir.join(format!("{}.jsonl", run_id))
    }
}
