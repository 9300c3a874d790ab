//! Copy Bot
//!
//! Mirrors tracked Polymarket traders onto the operator account and sweeps
//! resolved positions for redemption.

mod scheduler;

use anyhow::{Context, Result};
use clap::Parser;
use polymarket_core::api::DataApiClient;
use polymarket_core::config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trading_engine::{
    CopyTrader, DryRunRelay, JsonFileStore, PaperExecutor, RedemptionBatcher, StateHandle,
};

use scheduler::{MirrorLoop, RedeemLoop};

const HEALTH_FILE: &str = "/tmp/healthy";

const DEFAULT_LOG_FILTER: &str =
    "copy_bot=info,trading_engine=info,risk_manager=info,polymarket_core=warn,hyper=warn";

fn touch_health_file() {
    let _ = std::fs::write(HEALTH_FILE, format!("{}", chrono::Utc::now().timestamp()));
}

/// CLI arguments for copy-bot.
#[derive(Parser, Debug)]
#[command(name = "copy-bot")]
#[command(about = "Polymarket trade mirroring and redemption bot")]
#[command(version)]
struct Args {
    /// TOML config file (environment variables are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single iteration of each enabled loop and exit
    #[arg(long)]
    once: bool,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    info!("Starting Copy Bot");

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env().context("Failed to load config from environment")?,
    };
    info!(
        account = %config.mirror.account,
        traders = config.mirror.traders.len(),
        strategy = %config.mirror.strategy,
        redeem_enabled = config.redeem.enabled,
        state_path = %config.state_path.display(),
        "Configuration loaded"
    );

    let data_api = Arc::new(DataApiClient::new(&config.data_api)?);
    let store = Arc::new(JsonFileStore::new(config.state_path.clone()));
    let state = Arc::new(StateHandle::load(store).await?);

    warn!("Order submission and settlement run in paper mode");
    let executor = Arc::new(PaperExecutor::default());
    let copier = CopyTrader::new(&config, executor, data_api.clone(), state.mirror().await);
    let mut mirror = MirrorLoop::new(&config, data_api.clone(), copier, state.clone());

    let mut redeem = if config.redeem.enabled {
        let batcher = RedemptionBatcher::new(
            config.mirror.account.clone(),
            &config.redeem,
            data_api.clone(),
            Arc::new(DryRunRelay::new()),
            state.redeem().await,
        );
        Some(RedeemLoop::new(&config.redeem, batcher, state.clone()))
    } else {
        info!("Redemption loop disabled");
        None
    };

    touch_health_file();

    if args.once {
        mirror.run_once(chrono::Utc::now()).await?;
        if let Some(redeem) = redeem.as_mut() {
            redeem.run_once(chrono::Utc::now()).await?;
        }
        touch_health_file();
        info!("Single iteration complete");
        return Ok(());
    }

    let mirror_task = tokio::spawn(mirror.run());
    let redeem_task = redeem.map(|r| tokio::spawn(r.run()));

    mirror_task.await?;
    if let Some(task) = redeem_task {
        task.await?;
    }

    Ok(())
}
