//! scrobbler-batch - Historical scrobble submitter
//!
//! Submits one batch file of past listens to Last.fm, keeping the original
//! timestamps. Transient service failures are retried with backoff, requests are
//! paced, and a long failure streak stops the run. Every run appends the batch
//! file name to `scrobbled_files.txt` and any failed listens to `failed_songs.json`
//! in the logs directory, so a batch can be resumed with `--start-index`.

use anyhow::{Context, Result};
use clap::Parser;
use scrobbler_batch::input::load_batch;
use scrobbler_batch::services::{LastFmClient, ResultLog, ThrottleController, ThrottleSettings};
use scrobbler_batch::utils::{RetryPolicy, Sleeper, TokioSleeper};
use scrobbler_batch::workflow::BatchRunner;
use scrobbler_common::config::{
    default_config_path, load_toml_config, resolve_credentials, resolve_logs_dir, TomlConfig,
    DEFAULT_BASE_DELAY_SECS, DEFAULT_MAX_RETRIES,
};
use scrobbler_common::events::EventBus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for scrobbler-batch
#[derive(Parser, Debug)]
#[command(name = "scrobbler-batch")]
#[command(about = "Submit a batch of historical listens to Last.fm")]
#[command(version)]
struct Args {
    /// Filename of song batch (JSON array of listens)
    #[arg(long)]
    file: PathBuf,

    /// Index of song to start at
    #[arg(long, default_value_t = 0)]
    start_index: usize,

    /// Delay between requests in seconds [default: 0.4]
    #[arg(long)]
    delay: Option<f64>,

    /// Attempts per song on transient errors
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Directory for scrobbled_files.txt and failed_songs.json
    #[arg(long)]
    logs_dir: Option<PathBuf>,

    /// TOML config file [default: ~/.config/scrobbler/config.toml]
    #[arg(long, env = "SCROBBLER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = match args.config.clone().or_else(default_config_path) {
        Some(path) => load_toml_config(&path).context("Failed to load configuration")?,
        None => TomlConfig::default(),
    };

    init_tracing(&toml_config.logging.level);

    info!(
        "Starting scrobbler-batch v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let credentials =
        resolve_credentials(&toml_config).context("Failed to resolve Last.fm credentials")?;

    let logs_dir = resolve_logs_dir(args.logs_dir.as_deref(), &toml_config);
    let result_log = ResultLog::in_dir(&logs_dir);
    result_log
        .ensure_dirs()
        .with_context(|| format!("Failed to create logs directory {}", logs_dir.display()))?;
    info!("Logs directory: {}", logs_dir.display());

    let batch = load_batch(&args.file, args.start_index, toml_config.fallback_timestamp())
        .with_context(|| format!("Failed to load batch file {}", args.file.display()))?;

    if result_log
        .was_processed(&batch.name)
        .context("Failed to read processed-files log")?
    {
        warn!(
            "{} is already listed in the processed-files log; listens may be submitted twice",
            batch.name
        );
    }

    let client = LastFmClient::connect(&credentials, toml_config.api_url.as_deref())
        .await
        .context("Failed to connect to Last.fm")?;
    info!("Connected to {}", client.base_url());

    let base_delay = args
        .delay
        .or(toml_config.throttle.base_delay_secs)
        .unwrap_or(DEFAULT_BASE_DELAY_SECS);

    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
    let event_bus = EventBus::default();

    let retry = RetryPolicy::new(Arc::new(client), sleeper.clone(), args.max_retries)
        .with_event_bus(event_bus.clone());
    let throttle = ThrottleController::new(
        ThrottleSettings::default().with_base_delay_secs(base_delay),
        sleeper.clone(),
    );
    let mut runner = BatchRunner::new(retry, throttle, sleeper, event_bus);

    runner
        .run_and_record(&batch, &result_log)
        .await
        .context("Failed to write batch results")?;

    Ok(())
}

/// Initialize tracing; `RUST_LOG` overrides the configured level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "scrobbler_batch={level},scrobbler_common={level}",
            level = level
        ))
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
