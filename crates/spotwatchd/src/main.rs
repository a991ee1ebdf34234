//! spotwatchd — the spotwatch daemon.
//!
//! Single binary that assembles every spotwatch component:
//! - Price observation store (redb)
//! - Capability catalog (JSON file, loaded once)
//! - Ingestion scheduler (background task)
//! - REST API + Prometheus exposition
//!
//! # Usage
//!
//! ```text
//! spotwatchd serve --config spotwatch.toml --port 5000 --data-dir /var/lib/spotwatch
//! spotwatchd regenerate --config spotwatch.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use spotwatch_analytics::AggregationEngine;
use spotwatch_api::SpotService;
use spotwatch_catalog::InMemoryCatalog;
use spotwatch_core::SpotwatchConfig;
use spotwatch_ingest::{IngestScheduler, source_from_uri};
use spotwatch_state::PriceStore;

#[derive(Parser)]
#[command(name = "spotwatchd", about = "spotwatch daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion loop and serve the API.
    Serve {
        /// Path to spotwatch.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for the observation store (overrides the config file).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Run one ingestion cycle, print the report, and exit.
    Regenerate {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,spotwatchd=debug,spotwatch=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            run_serve(config).await
        }
        Command::Regenerate { config, data_dir } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            run_regenerate(config).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SpotwatchConfig> {
    match path {
        Some(path) => {
            let config = SpotwatchConfig::from_file(path)?;
            info!(?path, "configuration loaded");
            Ok(config)
        }
        None => {
            let config = SpotwatchConfig::default();
            config.validate()?;
            warn!("no --config given, using defaults");
            Ok(config)
        }
    }
}

/// Components shared by both subcommands.
struct Components {
    service: Arc<SpotService>,
    scheduler: Arc<IngestScheduler>,
}

fn assemble(config: &SpotwatchConfig) -> anyhow::Result<Components> {
    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.server.data_dir.join("spotwatch.redb");

    // Observation store.
    let store = Arc::new(PriceStore::open(&db_path)?);
    info!(path = ?db_path, "observation store opened");

    // Capability catalog.
    let catalog = Arc::new(InMemoryCatalog::load_or_empty(&config.catalog.path)?);

    // Price source + scheduler.
    let uri = config.ingest.source_uri()?;
    let source = source_from_uri(&uri, config.ingest.timeout()?);
    let scheduler = Arc::new(
        IngestScheduler::new(source, store.clone(), config.ingest.interval()?)
            .with_product_filter(config.ingest.product_description.clone()),
    );
    info!(source = %uri, interval = %config.ingest.interval, "ingest scheduler initialized");

    let engine = AggregationEngine::new(config.analytics.clone());
    info!(
        grouping = %config.analytics.grouping,
        steal_threshold = %config.analytics.steal_threshold,
        "aggregation engine initialized"
    );

    let service = Arc::new(SpotService::new(
        store,
        catalog,
        engine,
        scheduler.clone(),
    ));

    Ok(Components { service, scheduler })
}

async fn run_serve(config: SpotwatchConfig) -> anyhow::Result<()> {
    info!("spotwatch daemon starting");

    let Components { service, scheduler } = assemble(&config)?;

    // ── Start background ingestion ─────────────────────────────

    let ingest = scheduler.spawn();

    // ── Start API server ───────────────────────────────────────

    let router = spotwatch_api::build_router(service);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    });

    let served = server.await;

    // Stop ingestion whether or not the server exited cleanly.
    ingest.stop().await;
    served?;

    info!("spotwatch daemon stopped");
    Ok(())
}

async fn run_regenerate(config: SpotwatchConfig) -> anyhow::Result<()> {
    let Components { service, .. } = assemble(&config)?;

    let report = service.trigger_regeneration().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(e) = &report.source_error {
        anyhow::bail!("regeneration fetched nothing: {e}");
    }
    Ok(())
}
