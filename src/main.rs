//! Betfair Live Sync - Entry Point
//!
//! Initializes configuration, logging, the market store and the sync
//! engine, then runs the feed supervisor until SIGINT or a fatal error.
//!
//! Wiring sequence:
//! 1. Load config.toml + environment overrides + validate
//! 2. Init tracing (JSON or pretty structured logging)
//! 3. Open the market store (Postgres pool or in-memory)
//! 4. Create the exchange client and event source
//! 5. Spawn metrics (:9090) and health (/live + /ready) servers
//! 6. Run the feed supervisor with the sync engine as handler
//! 7. On SIGINT or fatal error: broadcast shutdown, close the store, exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use betfair_live_sync::adapters::api::{BetfairClient, BetfairClientConfig, HttpEventSource};
use betfair_live_sync::adapters::feeds::WsFeedConnector;
use betfair_live_sync::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use betfair_live_sync::adapters::persistence::{MemoryRepository, PgRepository};
use betfair_live_sync::config::{self, AppConfig};
use betfair_live_sync::ports::{EventSource, MarketDataApi, MarketRepository};
use betfair_live_sync::usecases::{FeedSupervisor, SupervisorSettings, SyncEngine, SyncSettings};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Tracing may not be initialized if config loading failed.
            eprintln!("fatal: {e:#}");
            error!(error = %format!("{e:#}"), "Service stopped with a fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::var(config::loader::CONFIG_PATH_ENV)
        .unwrap_or_else(|_| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured logging ────────────────────
    init_tracing(&config);

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        feed = %config.feed.url,
        backend = %config.persistence.backend,
        "Starting Betfair live sync"
    );

    // ── 3. Shutdown signal channel ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Open the market store ────────────────────────────
    let repo: Arc<dyn MarketRepository> = match config.persistence.backend.as_str() {
        "memory" => Arc::new(MemoryRepository::new()),
        _ => Arc::new(
            PgRepository::connect(&config.persistence)
                .await
                .context("Failed to connect to the market store")?,
        ),
    };

    // ── 5. Exchange client and event source ─────────────────
    let market_data: Arc<dyn MarketDataApi> = Arc::new(
        BetfairClient::new(BetfairClientConfig::from(&config.betfair))
            .context("Failed to create exchange client")?,
    );
    let events: Arc<dyn EventSource> = Arc::new(
        HttpEventSource::new(&config.events).context("Failed to create event source")?,
    );

    // ── 6. Metrics and health servers ───────────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let health = Arc::new(HealthState::new());

    let mut servers = Vec::new();
    if config.metrics.enabled {
        let metrics_rx = shutdown_tx.subscribe();
        let bind = config.metrics.bind_address.clone();
        let registry = Arc::clone(&metrics);
        servers.push(tokio::spawn(async move {
            if let Err(e) = registry.serve(bind, metrics_rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }));
    }
    {
        let health_rx = shutdown_tx.subscribe();
        let server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
        servers.push(tokio::spawn(async move {
            if let Err(e) = server.run(health_rx).await {
                error!(error = %e, "Health server failed");
            }
        }));
    }

    // ── 7. Ctrl-C → shutdown broadcast ──────────────────────
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("SIGINT received, initiating graceful shutdown");
                let _ = shutdown_tx.send(());
            }
        });
    }

    // ── 8. Sync engine + feed supervisor ────────────────────
    let engine = SyncEngine::new(
        market_data,
        events,
        Arc::clone(&repo),
        SyncSettings::from(&config.sync),
    )
    .with_metrics(Arc::clone(&metrics));

    let mut supervisor = FeedSupervisor::new(
        WsFeedConnector::new(&config.feed),
        engine,
        SupervisorSettings::from(&config),
    )
    .with_metrics(Arc::clone(&metrics))
    .with_health(Arc::clone(&health));

    info!("All tasks spawned, service is running");
    let outcome = supervisor.run(shutdown_tx.subscribe()).await;

    // ── Graceful shutdown ───────────────────────────────────
    health.set_engine_running(false);
    let _ = shutdown_tx.send(());
    repo.close().await;

    for handle in servers {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    outcome.context("Sync engine stopped")?;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.service.log_format == "pretty" {
        builder.pretty().init();
    } else {
        builder.json().init();
    }
}
