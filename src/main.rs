//! `forecast` - daily close forecasting runner
//!
//! # Usage
//! ```sh
//! forecast run --symbols AAPL,IBM,MSFT --epochs 15
//! forecast download --symbols-file tickers.txt
//! ```
//!
//! Configuration comes from the environment (`.env` is loaded first), then the
//! optional `--config` TOML file, then the flags below.

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use rustcast::application::orchestrator::{InstrumentStatus, OrchestratorReport, WaveOrchestrator, plan_waves};
use rustcast::application::pipeline::InstrumentPipeline;
use rustcast::config::{ForecastConfig, read_symbols_file, split_symbols};
use rustcast::domain::config::WaveConfig;
use rustcast::domain::ports::{DailySeriesProvider, ReportingSink};
use rustcast::domain::reporting::RunContext;
use rustcast::infrastructure::core::HttpClientFactory;
use rustcast::infrastructure::{AlphaVantageProvider, CsvDirectoryProvider, JsonLinesSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about = "LSTM and moving-average forecasts for daily closes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast every symbol, in rate-limited waves
    Run(RunArgs),
    /// Save upstream CSV files for offline runs
    Download(DownloadArgs),
}

#[derive(Args)]
struct SymbolArgs {
    /// Comma-separated list of symbols
    #[arg(short, long)]
    symbols: Option<String>,

    /// File with one symbol per line
    #[arg(long)]
    symbols_file: Option<PathBuf>,
}

impl SymbolArgs {
    fn resolve(&self) -> Result<Vec<String>> {
        let symbols = match (&self.symbols, &self.symbols_file) {
            (Some(list), _) => split_symbols(list),
            (None, Some(path)) => read_symbols_file(path)?,
            (None, None) => bail!("No symbols given: use --symbols or --symbols-file"),
        };
        if symbols.is_empty() {
            bail!("Symbol list is empty");
        }
        Ok(symbols)
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    symbols: SymbolArgs,

    /// Comma-separated symbols to skip (replaces the configured exclusion list)
    #[arg(long)]
    exclude: Option<String>,

    /// Instruments per wave
    #[arg(long)]
    wave_width: Option<usize>,

    /// Seconds to wait after dispatching each wave
    #[arg(long)]
    cooldown_secs: Option<u64>,

    /// Most recent daily rows fetched per symbol
    #[arg(long)]
    lookback: Option<usize>,

    #[arg(long)]
    epochs: Option<usize>,

    /// Seed for weight initialisation and shuffling
    #[arg(long)]
    seed: Option<u64>,

    /// Experiment id (generated from the current time when absent)
    #[arg(long)]
    run_id: Option<String>,

    /// Read `{DIR}/{SYMBOL}.csv` instead of calling the API
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML file with [pipeline], [model] and [waves] sections
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct DownloadArgs {
    #[command(flatten)]
    symbols: SymbolArgs,

    /// Target directory (defaults to DATA_DIR, then `data`)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Rows to request per symbol
    #[arg(long)]
    lookback: Option<usize>,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ForecastConfig::from_env()?;

    match cli.command {
        Commands::Run(args) => run(config, args).await,
        Commands::Download(args) => download(config, args).await,
    }
}

fn alpha_vantage(config: &ForecastConfig) -> Result<AlphaVantageProvider> {
    if config.provider.api_token.is_empty() {
        bail!("ALPHA_VANTAGE_API_TOKEN is not set (or pass --data-dir to run offline)");
    }
    Ok(AlphaVantageProvider::new(
        HttpClientFactory::create_client(config.provider.http_timeout()),
        config.provider.base_url.clone(),
        config.provider.api_token.clone(),
    ))
}

async fn run(mut config: ForecastConfig, args: RunArgs) -> Result<()> {
    if let Some(path) = &args.config {
        config.apply_overlay_file(path)?;
    }
    if let Some(list) = &args.exclude {
        config.waves.excluded = split_symbols(list).into_iter().collect();
    }
    if let Some(width) = args.wave_width {
        config.waves.width = width;
    }
    if let Some(secs) = args.cooldown_secs {
        config.waves.cooldown_secs = secs;
    }
    if let Some(lookback) = args.lookback {
        config.pipeline.lookback_rows = lookback;
    }
    if let Some(epochs) = args.epochs {
        config.model.epochs = epochs;
    }
    if args.seed.is_some() {
        config.model.seed = args.seed;
    }
    if let Some(dir) = &args.data_dir {
        config.provider.data_dir = Some(dir.clone());
    }
    config.validate()?;

    let symbols = args.symbols.resolve()?;
    let context = match &args.run_id {
        Some(id) => RunContext::new(id.clone())?,
        None => RunContext::generate(&Local::now()),
    };
    info!("forecast {} run {}", env!("CARGO_PKG_VERSION"), context.run_id());
    info!("Configuration loaded: {:?}", config);

    let provider: Arc<dyn DailySeriesProvider> = match &config.provider.data_dir {
        Some(dir) => Arc::new(CsvDirectoryProvider::new(dir.clone())),
        None => Arc::new(alpha_vantage(&config)?),
    };
    let sink: Arc<dyn ReportingSink> = if config.reporting.stdout {
        Arc::new(JsonLinesSink::stdout())
    } else {
        Arc::new(JsonLinesSink::create(&config.reporting.report_path(context.run_id()))?)
    };

    let pipeline = InstrumentPipeline::new(provider, sink, config.pipeline.clone(), config.model.clone());
    let orchestrator = WaveOrchestrator::new(Arc::new(pipeline), config.waves.clone(), context);
    let report = orchestrator.run(&symbols).await;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &OrchestratorReport) {
    println!("{}", "=".repeat(72));
    println!("Run {} ({} waves)", report.run_id, report.waves);
    println!("{}", "=".repeat(72));
    println!("{:<10} {:>5}  {}", "SYMBOL", "WAVE", "STATUS");
    for outcome in &report.outcomes {
        let status = match &outcome.status {
            InstrumentStatus::Completed => "completed".to_string(),
            InstrumentStatus::Failed(reason) => format!("failed: {}", reason),
        };
        println!("{:<10} {:>5}  {}", outcome.symbol, outcome.wave, status);
    }
    for symbol in &report.skipped {
        println!("{:<10} {:>5}  excluded", symbol, "-");
    }
    println!("{}", "-".repeat(72));
    println!(
        "{} completed, {} failed, {} excluded",
        report.completed(),
        report.failed(),
        report.skipped.len()
    );
}

async fn download(config: ForecastConfig, args: DownloadArgs) -> Result<()> {
    let symbols = args.symbols.resolve()?;
    let dir = args
        .data_dir
        .or_else(|| config.provider.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from("data"));
    let lookback = args.lookback.unwrap_or(config.pipeline.lookback_rows);
    let provider = alpha_vantage(&config)?;
    let store = CsvDirectoryProvider::new(dir);

    // same rate shaping as `run`, without exclusions
    let waves = WaveConfig {
        excluded: Default::default(),
        ..config.waves.clone()
    };
    let plan = plan_waves(&symbols, &waves);
    let mut failures = 0usize;

    for (idx, wave) in plan.waves.iter().enumerate() {
        if idx > 0 {
            tokio::time::sleep(waves.cooldown()).await;
        }
        for symbol in wave {
            match download_one(&provider, &store, symbol, lookback).await {
                Ok(path) => println!("{:<10} -> {}", symbol, path.display()),
                Err(e) => {
                    failures += 1;
                    error!("{:#}", e);
                }
            }
        }
    }

    if failures > 0 {
        warn!("{} of {} downloads failed", failures, symbols.len());
    }
    Ok(())
}

async fn download_one(
    provider: &AlphaVantageProvider,
    store: &CsvDirectoryProvider,
    symbol: &str,
    lookback: usize,
) -> Result<PathBuf> {
    let body = provider
        .download_csv(symbol, lookback)
        .await
        .with_context(|| format!("Download failed for {}", symbol))?;
    store
        .store(symbol, &body)
        .await
        .with_context(|| format!("Could not store {}", symbol))
}
