use crate::domain::metrics::Scores;
use crate::domain::ports::ReportingSink;
use crate::domain::reporting::{Chart, InstrumentNamespace};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

pub const RMSE: &str = "RMSE";
pub const MAPE: &str = "MAPE (%)";

/// Writes one instrument's results into its own namespace.
///
/// Reporting is fire-and-forget: a sink failure is logged and the pipeline
/// carries on.
#[derive(Clone)]
pub struct InstrumentReporter {
    sink: Arc<dyn ReportingSink>,
    namespace: InstrumentNamespace,
}

impl InstrumentReporter {
    pub fn new(sink: Arc<dyn ReportingSink>, namespace: InstrumentNamespace) -> Self {
        Self { sink, namespace }
    }

    pub fn namespace(&self) -> &InstrumentNamespace {
        &self.namespace
    }

    pub async fn scalar(&self, component: &str, name: &str, value: f64) {
        let path = self.namespace.path(component, name);
        if let Err(e) = self.sink.report_scalar(&path, value).await {
            warn!("InstrumentReporter: failed to report {}: {}", path, e);
        }
    }

    pub async fn params(&self, component: &str, name: &str, params: &BTreeMap<String, Value>) {
        let path = self.namespace.path(component, name);
        if let Err(e) = self.sink.report_params(&path, params).await {
            warn!("InstrumentReporter: failed to report {}: {}", path, e);
        }
    }

    pub async fn text(&self, component: &str, name: &str, text: &str) {
        self.text_at(self.namespace.path(component, name), text).await;
    }

    /// Text directly under `{run_id}/{symbol}`.
    pub async fn field(&self, name: &str, text: &str) {
        self.text_at(self.namespace.field(name), text).await;
    }

    async fn text_at(&self, path: String, text: &str) {
        if let Err(e) = self.sink.report_text(&path, text).await {
            warn!("InstrumentReporter: failed to report {}: {}", path, e);
        }
    }

    pub async fn image(&self, component: &str, name: &str, chart: &Chart) {
        let path = self.namespace.path(component, name);
        if let Err(e) = self.sink.report_image(&path, chart).await {
            warn!("InstrumentReporter: failed to report {}: {}", path, e);
        }
    }

    /// RMSE always; MAPE when defined, otherwise a warning marker next to it.
    pub async fn scores(&self, component: &str, scores: &Scores) {
        self.scalar(component, RMSE, scores.rmse).await;
        match scores.mape {
            Some(mape) => self.scalar(component, MAPE, mape).await,
            None => {
                warn!(
                    "InstrumentReporter [{}]: {} MAPE undefined (zero close in test rows), omitted",
                    self.namespace.symbol(),
                    component
                );
                self.text(
                    component,
                    &format!("{}/warning", MAPE),
                    "MetricUndefined: zero close price in scored rows",
                )
                .await;
            }
        }
    }
}
