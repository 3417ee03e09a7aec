//! Rate-limited fan-out of [`InstrumentPipeline`] runs.
//!
//! Symbols are filtered against the exclusion set and cut into consecutive
//! waves of at most `width`. Each wave spawns one blocking-pool worker per
//! instrument, waits out the cooldown, then joins every worker before the next
//! wave starts. Instrument failures and worker panics become
//! [`InstrumentStatus::Failed`]; the orchestrator itself never fails.

use crate::application::pipeline::InstrumentPipeline;
use crate::domain::config::WaveConfig;
use crate::domain::config::wave_config::normalize_symbol;
use crate::domain::reporting::RunContext;
use futures::future::join_all;
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum InstrumentStatus {
    Completed,
    Failed(String),
}

impl InstrumentStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, InstrumentStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentOutcome {
    pub symbol: String,
    /// 1-based wave index
    pub wave: usize,
    pub status: InstrumentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorReport {
    pub run_id: String,
    pub waves: usize,
    /// In input order
    pub outcomes: Vec<InstrumentOutcome>,
    /// Symbols dropped by the exclusion filter
    pub skipped: Vec<String>,
}

impl OrchestratorReport {
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_completed())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}

/// Result of the exclusion filter and wave cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavePlan {
    pub waves: Vec<Vec<String>>,
    pub skipped: Vec<String>,
}

/// Trims and upper-cases symbols, drops blanks, repeats and excluded ones,
/// then groups the rest into consecutive waves of at most `config.width`.
/// The first occurrence of a repeated symbol keeps its position.
pub fn plan_waves(symbols: &[String], config: &WaveConfig) -> WavePlan {
    let mut kept = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();
    for symbol in symbols.iter().map(|s| normalize_symbol(s)) {
        if symbol.is_empty() {
            continue;
        }
        if !seen.insert(symbol.clone()) {
            warn!("Dropping duplicate symbol {}", symbol);
            continue;
        }
        if config.is_excluded(&symbol) {
            skipped.push(symbol);
        } else {
            kept.push(symbol);
        }
    }

    let width = config.width.max(1);
    WavePlan {
        waves: kept.chunks(width).map(<[String]>::to_vec).collect(),
        skipped,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub struct WaveOrchestrator {
    pipeline: Arc<InstrumentPipeline>,
    config: WaveConfig,
    context: RunContext,
}

impl WaveOrchestrator {
    pub fn new(pipeline: Arc<InstrumentPipeline>, config: WaveConfig, context: RunContext) -> Self {
        Self {
            pipeline,
            config,
            context,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Must be called from within a multi-threaded Tokio runtime.
    pub async fn run(&self, symbols: &[String]) -> OrchestratorReport {
        let plan = plan_waves(symbols, &self.config);
        if !plan.skipped.is_empty() {
            info!("WaveOrchestrator: excluded {:?}", plan.skipped);
        }
        let total_waves = plan.waves.len();
        info!(
            "WaveOrchestrator [{}]: {} instruments in {} waves (width {}, cooldown {:?})",
            self.context.run_id(),
            plan.waves.iter().map(Vec::len).sum::<usize>(),
            total_waves,
            self.config.width,
            self.config.cooldown()
        );

        let handle = Handle::current();
        let mut outcomes = Vec::new();

        for (idx, wave) in plan.waves.into_iter().enumerate() {
            let wave_no = idx + 1;
            let started = Instant::now();
            info!("WaveOrchestrator: dispatching wave {}/{}: {:?}", wave_no, total_waves, wave);

            let workers: Vec<_> = wave
                .iter()
                .map(|symbol| {
                    let pipeline = self.pipeline.clone();
                    let context = self.context.clone();
                    let symbol = symbol.clone();
                    let handle = handle.clone();
                    tokio::task::spawn_blocking(move || {
                        handle.block_on(async move { pipeline.run(&context, &symbol).await })
                    })
                })
                .collect();

            tokio::time::sleep(self.config.cooldown()).await;
            let joined = join_all(workers).await;

            for (symbol, result) in wave.into_iter().zip(joined) {
                let status = match result {
                    Ok(Ok(_)) => InstrumentStatus::Completed,
                    Ok(Err(e)) => {
                        warn!("WaveOrchestrator [{}]: failed: {}", symbol, e);
                        InstrumentStatus::Failed(format!("{}: {}", e.kind(), e))
                    }
                    Err(join_err) => {
                        let reason = if join_err.is_panic() {
                            format!("worker panicked: {}", panic_message(&*join_err.into_panic()))
                        } else {
                            format!("worker cancelled: {}", join_err)
                        };
                        error!("WaveOrchestrator [{}]: {}", symbol, reason);
                        InstrumentStatus::Failed(reason)
                    }
                };
                outcomes.push(InstrumentOutcome {
                    symbol,
                    wave: wave_no,
                    status,
                });
            }

            info!(
                "WaveOrchestrator: wave {}/{} joined after {:.1}s",
                wave_no,
                total_waves,
                started.elapsed().as_secs_f64()
            );
        }

        let report = OrchestratorReport {
            run_id: self.context.run_id().to_string(),
            waves: total_waves,
            outcomes,
            skipped: plan.skipped,
        };
        info!(
            "WaveOrchestrator [{}]: done, {} completed, {} failed",
            report.run_id,
            report.completed(),
            report.failed()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{ModelConfig, PipelineConfig};
    use crate::domain::errors::ForecastError;
    use crate::domain::ports::DailySeriesProvider;
    use crate::domain::series::PriceSeries;
    use crate::infrastructure::mock::RecordingSink;
    use async_trait::async_trait;
    use std::time::Duration;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_six_symbols_width_four() {
        let config = WaveConfig::new(4, Duration::ZERO, Vec::new()).unwrap();
        let plan = plan_waves(&symbols(&["A", "B", "C", "D", "E", "F"]), &config);
        assert_eq!(
            plan.waves,
            vec![symbols(&["A", "B", "C", "D"]), symbols(&["E", "F"])]
        );
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_exclusion_is_case_insensitive_and_trimmed() {
        let config = WaveConfig::default();
        let plan = plan_waves(&symbols(&[" aapl", "amzn ", "Tsla", "IBM", ""]), &config);
        assert_eq!(plan.waves, vec![symbols(&["AAPL", "IBM"])]);
        assert_eq!(plan.skipped, symbols(&["AMZN", "TSLA"]));
    }

    #[test]
    fn test_repeated_symbols_run_once() {
        let config = WaveConfig::new(4, Duration::ZERO, Vec::new()).unwrap();
        let plan = plan_waves(&symbols(&["AAPL", " aapl", "IBM", "Aapl ", "ibm"]), &config);
        assert_eq!(plan.waves, vec![symbols(&["AAPL", "IBM"])]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_empty_input_has_no_waves() {
        let plan = plan_waves(&[], &WaveConfig::default());
        assert!(plan.waves.is_empty());
    }

    #[test]
    fn test_status_serialization() {
        let failed = InstrumentStatus::Failed("FetchError: boom".to_string());
        let json = serde_json::to_string(&failed).unwrap();
        assert_eq!(json, r#"{"status":"failed","reason":"FetchError: boom"}"#);
    }

    struct PanickingProvider;

    #[async_trait]
    impl DailySeriesProvider for PanickingProvider {
        async fn fetch_daily_series(&self, _symbol: &str, _max_rows: usize) -> Result<PriceSeries, ForecastError> {
            panic!("provider exploded");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_panic_becomes_failed_status() {
        let pipeline = InstrumentPipeline::new(
            Arc::new(PanickingProvider),
            Arc::new(RecordingSink::new()),
            PipelineConfig::default(),
            ModelConfig::default(),
        );
        let config = WaveConfig::new(4, Duration::ZERO, Vec::new()).unwrap();
        let orchestrator = WaveOrchestrator::new(
            Arc::new(pipeline),
            config,
            RunContext::new("EXP-PANIC").unwrap(),
        );

        let report = orchestrator.run(&symbols(&["X", "Y"])).await;
        assert_eq!(report.outcomes.len(), 2);
        for outcome in &report.outcomes {
            match &outcome.status {
                InstrumentStatus::Failed(reason) => assert!(reason.contains("provider exploded")),
                other => panic!("unexpected status {:?}", other),
            }
        }
    }
}
