use rustcast::application::orchestrator::{InstrumentStatus, WaveOrchestrator};
use rustcast::application::pipeline::InstrumentPipeline;
use rustcast::domain::config::{ModelConfig, PipelineConfig, WaveConfig};
use rustcast::domain::reporting::RunContext;
use rustcast::infrastructure::mock::{MockDailySeriesProvider, RecordingSink, synthetic_bars};
use rustcast::infrastructure::reporting::ReportPayload;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn tiny_model() -> ModelConfig {
    ModelConfig {
        window_size: 5,
        hidden_units: 4,
        epochs: 2,
        batch_size: 8,
        learning_rate: 0.01,
        validation_split: 0.1,
        seed: Some(11),
    }
}

fn small_pipeline() -> PipelineConfig {
    PipelineConfig {
        lookback_rows: 50,
        train_ratio: 0.8,
        sma_window: 5,
        ema_window: 5,
        context_sma_window: 20,
    }
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn orchestrator(
    provider: Arc<MockDailySeriesProvider>,
    sink: Arc<RecordingSink>,
    waves: WaveConfig,
    run_id: &str,
) -> WaveOrchestrator {
    let pipeline = InstrumentPipeline::new(provider, sink, small_pipeline(), tiny_model());
    WaveOrchestrator::new(Arc::new(pipeline), waves, RunContext::new(run_id).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_six_instruments_run_in_two_waves_in_input_order() {
    let names = ["AAPL", "IBM", "MSFT", "ORCL", "INTC", "CSCO"];
    let mut provider = MockDailySeriesProvider::new();
    for (i, name) in names.iter().enumerate() {
        provider = provider.with_series(name, synthetic_bars(60, 40.0 + 10.0 * i as f64));
    }
    let provider = Arc::new(provider);
    let sink = Arc::new(RecordingSink::new());
    let waves = WaveConfig::new(4, Duration::ZERO, Vec::new()).unwrap();

    let report = orchestrator(provider, sink.clone(), waves, "EXP-WAVES")
        .run(&symbols(&names))
        .await;

    assert_eq!(report.waves, 2);
    let order: Vec<&str> = report.outcomes.iter().map(|o| o.symbol.as_str()).collect();
    assert_eq!(order, names.to_vec());
    let wave_of: Vec<usize> = report.outcomes.iter().map(|o| o.wave).collect();
    assert_eq!(wave_of, vec![1, 1, 1, 1, 2, 2]);
    assert_eq!(report.completed(), 6);

    for name in names {
        assert_eq!(
            sink.records_at(&format!("EXP-WAVES/{}/status", name)),
            vec![ReportPayload::Text("complete".to_string())]
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_fetch_only_fails_that_instrument() {
    let provider = Arc::new(
        MockDailySeriesProvider::new()
            .with_series("AAPL", synthetic_bars(60, 150.0))
            .with_failure("IBM", "Note: API call frequency exceeded")
            .with_series("MSFT", synthetic_bars(60, 300.0)),
    );
    let sink = Arc::new(RecordingSink::new());
    let waves = WaveConfig::new(4, Duration::ZERO, Vec::new()).unwrap();

    let report = orchestrator(provider, sink.clone(), waves, "EXP-MIXED")
        .run(&symbols(&["AAPL", "IBM", "MSFT", "NOPE"]))
        .await;

    let statuses: Vec<&InstrumentStatus> = report.outcomes.iter().map(|o| &o.status).collect();
    assert_eq!(statuses[0], &InstrumentStatus::Completed);
    assert!(matches!(statuses[1], InstrumentStatus::Failed(r) if r.starts_with("FetchError") && r.contains("frequency")));
    assert_eq!(statuses[2], &InstrumentStatus::Completed);
    assert!(matches!(statuses[3], InstrumentStatus::Failed(_)));
    assert_eq!(report.completed(), 2);
    assert_eq!(report.failed(), 2);

    assert!(
        sink.paths()
            .iter()
            .all(|p| !p.starts_with("EXP-MIXED/IBM/"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_excluded_symbols_never_fetched() {
    let provider = Arc::new(
        MockDailySeriesProvider::new()
            .with_series("AAPL", synthetic_bars(60, 150.0))
            .with_series("AMZN", synthetic_bars(60, 120.0)),
    );
    let sink = Arc::new(RecordingSink::new());
    let waves = WaveConfig {
        cooldown_secs: 0,
        ..WaveConfig::default()
    };

    let report = orchestrator(provider.clone(), sink, waves, "EXP-EXCL")
        .run(&symbols(&["amzn", "AAPL"]))
        .await;

    assert_eq!(report.skipped, symbols(&["AMZN"]));
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(provider.calls(), vec!["AAPL"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waves_bound_concurrency_and_wait_for_cooldown() {
    let names = ["A", "B", "C", "D", "E"];
    let mut provider = MockDailySeriesProvider::new().with_delay(Duration::from_millis(50));
    for name in names {
        provider = provider.with_failure(name, "offline");
    }
    let provider = Arc::new(provider);
    let waves = WaveConfig::new(2, Duration::ZERO, Vec::new()).unwrap();

    let started = Instant::now();
    let report = orchestrator(provider.clone(), Arc::new(RecordingSink::new()), waves, "EXP-BOUND")
        .run(&symbols(&names))
        .await;

    assert_eq!(report.waves, 3);
    assert_eq!(provider.calls().len(), 5);
    assert!(provider.peak_concurrency() <= 2);
    // three sequential waves, each held open by the provider delay
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cooldown_applies_per_wave() {
    let provider = Arc::new(MockDailySeriesProvider::new().with_failure("A", "offline").with_failure("B", "offline"));
    let waves = WaveConfig::new(1, Duration::from_secs(1), Vec::new()).unwrap();

    let started = Instant::now();
    let report = orchestrator(provider, Arc::new(RecordingSink::new()), waves, "EXP-COOL")
        .run(&symbols(&["A", "B"]))
        .await;

    assert_eq!(report.waves, 2);
    assert!(started.elapsed() >= Duration::from_secs(2));
}
