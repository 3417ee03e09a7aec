//! Single-instrument forecasting run: fetch → split → baselines → LSTM → report.

use crate::application::baseline::{BaselineEstimator, BaselineResult};
use crate::application::instrument_reporter::InstrumentReporter;
use crate::application::ml::SequenceForecaster;
use crate::domain::config::{ModelConfig, PipelineConfig};
use crate::domain::errors::ForecastError;
use crate::domain::metrics::Scores;
use crate::domain::ports::{DailySeriesProvider, ReportingSink};
use crate::domain::reporting::RunContext;
use crate::domain::series::Split;
use std::sync::Arc;
use tracing::{info, warn};

/// Scores collected from one successful run. A baseline whose stage failed
/// is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRun {
    pub symbol: String,
    pub rows: usize,
    pub split: Split,
    pub sma: Option<Scores>,
    pub ema: Option<Scores>,
    pub lstm: Scores,
}

/// Stateless per-instrument pipeline. Shared read-only between workers; each
/// call to [`InstrumentPipeline::run`] owns all of its intermediate data.
pub struct InstrumentPipeline {
    provider: Arc<dyn DailySeriesProvider>,
    sink: Arc<dyn ReportingSink>,
    config: PipelineConfig,
    model: ModelConfig,
}

impl InstrumentPipeline {
    pub fn new(
        provider: Arc<dyn DailySeriesProvider>,
        sink: Arc<dyn ReportingSink>,
        config: PipelineConfig,
        model: ModelConfig,
    ) -> Self {
        Self {
            provider,
            sink,
            config,
            model,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model
    }

    pub async fn run(&self, context: &RunContext, symbol: &str) -> Result<InstrumentRun, ForecastError> {
        let namespace = context.namespace(symbol)?;
        let series = self
            .provider
            .fetch_daily_series(symbol, self.config.lookback_rows)
            .await?;
        info!(
            "InstrumentPipeline [{}]: fetched {} daily rows",
            symbol,
            series.len()
        );

        let dates = series.chronological_dates();
        let closes = series.chronological_closes();
        let split = Split::new(closes.len(), self.config.train_ratio)?;
        let reporter = InstrumentReporter::new(self.sink.clone(), namespace);

        let sma = BaselineEstimator::sma(self.config.sma_window, self.config.context_sma_window);
        let sma_scores = self
            .baseline_stage(&sma, sma.evaluate(&series, split), &reporter)
            .await;
        let ema = BaselineEstimator::ema(self.config.ema_window, self.config.context_sma_window);
        let ema_scores = self
            .baseline_stage(&ema, ema.evaluate(&series, split), &reporter)
            .await;

        let result = SequenceForecaster::new(self.model.clone())?
            .forecast(split.train(&closes), split.test(&closes))?;
        result
            .report(
                &reporter,
                (split.train(&dates), split.train(&closes)),
                (split.test(&dates), split.test(&closes)),
            )
            .await;

        reporter.field("status", "complete").await;
        info!(
            "InstrumentPipeline [{}]: complete (train={}, test={})",
            symbol, split.train_size, split.test_size
        );

        Ok(InstrumentRun {
            symbol: symbol.to_string(),
            rows: closes.len(),
            split,
            sma: sma_scores,
            ema: ema_scores,
            lstm: result.scores,
        })
    }

    /// Reports a baseline, or logs and records its failure without stopping the run.
    async fn baseline_stage(
        &self,
        estimator: &BaselineEstimator,
        outcome: Result<BaselineResult, ForecastError>,
        reporter: &InstrumentReporter,
    ) -> Option<Scores> {
        let component = estimator.kind().component();
        match outcome {
            Ok(result) => {
                estimator.report(&result, reporter).await;
                Some(result.scores)
            }
            Err(e) => {
                warn!(
                    "InstrumentPipeline [{}]: {} stage failed: {}",
                    reporter.namespace().symbol(),
                    component,
                    e
                );
                reporter
                    .text(component, "error", &format!("{}: {}", e.kind(), e))
                    .await;
                None
            }
        }
    }
}
