use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use harvest_client::{ChromiumDriver, CsvRecordStore, HttpProxyProbe, ProxyScrapeSource};
use harvest_core::engine::{Engine, TracingRunReporter};
use harvest_core::proxy::{PoolConfig, ProxyPool};
use harvest_core::session::{RunSession, StopReason};
use harvest_core::traits::{ProxySource, RecordStore};
use harvest_core::{HarvestError, UniformDelay};

/// Exit code when the proxy listing service is unreachable or empty.
const EXIT_PROXY_SOURCE_UNAVAILABLE: i32 = 2;
/// Exit code when every proxy candidate was discarded mid-run.
const EXIT_PROXY_POOL_EXHAUSTED: i32 = 3;

#[derive(Parser)]
#[command(name = "harvest", version, about = "Profile scraper with proxy-rotation resilience")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every pending record in the input list
    Run(RunArgs),

    /// Show done/failed/pending counts for a record list
    Status {
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Tabular record list; acts as job queue and checkpoint
    #[arg(short, long)]
    input: PathBuf,

    /// Proxy listing API key
    #[arg(long, env = "HARVEST_PROXY_API_KEY")]
    api_key: Option<String>,

    /// Proxy listing endpoint (ProxyScrape-compatible)
    #[arg(long, env = "HARVEST_PROXY_API_URL")]
    proxy_api_url: Option<String>,

    /// Consecutive blocked signals before rotating the proxy
    #[arg(long, default_value_t = 5)]
    threshold: u32,

    /// Minimum inter-request delay in seconds
    #[arg(long, default_value_t = 2)]
    delay_min: u64,

    /// Maximum inter-request delay in seconds
    #[arg(long, default_value_t = 5)]
    delay_max: u64,

    /// Navigation timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Stop after this many records complete, leaving the rest pending
    #[arg(long)]
    limit: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("harvest=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Run(args) => cmd_run(args).await?,
        Commands::Status { input } => {
            cmd_status(&input).await?;
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn cmd_run(args: RunArgs) -> Result<i32> {
    if args.threshold == 0 {
        bail!("--threshold must be at least 1");
    }
    if args.delay_min > args.delay_max {
        bail!("--delay-min must not exceed --delay-max");
    }

    let store = CsvRecordStore::open(&args.input)
        .with_context(|| format!("failed to open record list: {}", args.input.display()))?;

    let source = match args.proxy_api_url.as_deref() {
        Some(url) => ProxyScrapeSource::with_api_url(url, args.api_key),
        None => ProxyScrapeSource::new(args.api_key),
    }
    .map_err(|e| anyhow::anyhow!(e))?;

    let candidates = match source.fetch_candidates().await {
        Ok(candidates) => candidates,
        Err(e @ HarvestError::ProxySourceUnavailable(_)) => {
            tracing::error!(error = %e, "Cannot start run");
            eprintln!("{e}");
            return Ok(EXIT_PROXY_SOURCE_UNAVAILABLE);
        }
        Err(e) => return Err(e.into()),
    };

    let pool = match ProxyPool::new(
        candidates,
        PoolConfig {
            failure_threshold: args.threshold,
        },
    ) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{e}");
            return Ok(EXIT_PROXY_SOURCE_UNAVAILABLE);
        }
    };

    let driver = ChromiumDriver::with_timeout(Duration::from_secs(args.timeout));
    let delay = UniformDelay::new(
        Duration::from_secs(args.delay_min),
        Duration::from_secs(args.delay_max),
    );

    let engine =
        Engine::new(store, driver, delay, HttpProxyProbe::new()).with_record_limit(args.limit);
    let summary = engine
        .run(RunSession::start(pool), &TracingRunReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("{summary}");

    Ok(match summary.reason {
        StopReason::Completed | StopReason::RecordLimit => 0,
        StopReason::PoolExhausted => EXIT_PROXY_POOL_EXHAUSTED,
    })
}

async fn cmd_status(input: &PathBuf) -> Result<()> {
    let store = CsvRecordStore::open(input)
        .with_context(|| format!("failed to open record list: {}", input.display()))?;
    let counts = store.counts().await.map_err(|e| anyhow::anyhow!(e))?;

    println!(
        "{}: {} done, {} failed, {} pending",
        input.display(),
        counts.done,
        counts.failed,
        counts.pending
    );

    Ok(())
}
