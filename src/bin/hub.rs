use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use server_inventory::{
    StatusEngine,
    actors::SchedulerHandle,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{Config, StorageConfig, read_config_file},
    monitors::NetworkProber,
    storage::{MemoryStore, StatusStore, sqlite::SqliteStore},
};
use tokio::sync::broadcast;
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short)]
    file: Option<String>,

    /// Run a single cycle, print its report and exit
    #[arg(long)]
    once: bool,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("server_inventory", LevelFilter::DEBUG),
        ("inventory_hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn StatusStore>> {
    match config.storage.clone().unwrap_or_default() {
        StorageConfig::None => {
            warn!("using in-memory storage, the inventory is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageConfig::Sqlite { path } => {
            info!("opening SQLite inventory at {}", path.display());
            let store = SqliteStore::new(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    };
    debug!("poller settings: {:?}", config.poller);

    let store = open_store(&config).await?;
    let prober = NetworkProber::new(config.poller.timeout(), config.poller.ping)
        .context("failed to build HTTP client")?;
    let engine = Arc::new(StatusEngine::new(
        store,
        Arc::new(prober),
        config.poller.max_concurrent_probes,
    ));

    if args.once {
        let report = engine.run_cycle().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (event_tx, _) = broadcast::channel(16);
    let scheduler = SchedulerHandle::spawn(Arc::clone(&engine), config.poller.interval(), event_tx);

    if config.api.enabled {
        let state = ApiState::new(engine, Some(scheduler.clone()));
        spawn_api_server(ApiConfig::from(&config.api), state).await?;
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    scheduler.shutdown().await?;

    Ok(())
}
