//! Reporting sink writing one JSON record per line.
//!
//! Every worker of a run shares the same sink. The writer sits behind a single
//! mutex, so concurrent appends land as whole lines and never interleave.

use crate::domain::ports::ReportingSink;
use crate::domain::reporting::Chart;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReportPayload {
    Scalar(f64),
    Params(BTreeMap<String, Value>),
    Text(String),
    Image(Chart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub payload: ReportPayload,
}

pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
    prefix: &'static str,
}

impl JsonLinesSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            prefix: "",
        }
    }

    /// Appends to `path`, creating parent directories as needed.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open report file {}", path.display()))?;
        info!("JsonLinesSink: writing reports to {}", path.display());
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    /// Lines prefixed with `REPORT_JSON:` so they can be grepped out of logs.
    pub fn stdout() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
            prefix: "REPORT_JSON:",
        }
    }

    fn append(&self, path: &str, payload: ReportPayload) -> Result<()> {
        let record = ReportRecord {
            timestamp: Utc::now(),
            path: path.to_string(),
            payload,
        };
        let line = serde_json::to_string(&record).context("Failed to serialize report record")?;

        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("JsonLinesSink: writer lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        writeln!(writer, "{}{}", self.prefix, line).context("Failed to append report record")?;
        writer.flush().context("Failed to flush report writer")?;
        Ok(())
    }
}

#[async_trait]
impl ReportingSink for JsonLinesSink {
    async fn report_scalar(&self, path: &str, value: f64) -> Result<()> {
        self.append(path, ReportPayload::Scalar(value))
    }

    async fn report_params(&self, path: &str, params: &BTreeMap<String, Value>) -> Result<()> {
        self.append(path, ReportPayload::Params(params.clone()))
    }

    async fn report_text(&self, path: &str, text: &str) -> Result<()> {
        self.append(path, ReportPayload::Text(text.to_string()))
    }

    async fn report_image(&self, path: &str, chart: &Chart) -> Result<()> {
        self.append(path, ReportPayload::Image(chart.clone()))
    }
}
