//! Prometheus Metrics Registry - Sync Observability
//!
//! Registers and exposes Prometheus metrics on :9090. Covers feed health,
//! market-book polling, runner writes, bootstraps and reconciliation.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

/// Centralized Prometheus metrics for the sync service.
///
/// All metrics follow the naming convention `betfair_sync_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Feed messages by outcome (`ok`, `decode_error`).
    pub feed_messages: IntCounterVec,
    /// Feed redials after a dropped or failed connection.
    pub feed_reconnects: IntCounter,
    /// Feed connection status (1 = connected, 0 = disconnected).
    pub feed_connected: Gauge,
    /// `listMarketBook` calls by outcome (`ok`, `error`).
    pub market_book_requests: IntCounterVec,
    /// Runner writes by kind (`price`, `status`).
    pub runner_writes: IntCounterVec,
    /// Bootstraps by outcome (`ok`, `fetch_failed`).
    pub bootstraps: IntCounterVec,
    /// Completed reconciliation passes.
    pub reconcile_runs: IntCounter,
    /// Markets polled by reconciliation.
    pub reconciled_markets: IntCounter,
    /// Games currently in the live set.
    pub live_games: IntGauge,
    /// Processing time per feed batch or reconciliation pass (seconds).
    pub cycle_duration: HistogramVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let feed_messages = IntCounterVec::new(
            Opts::new("betfair_sync_feed_messages_total", "Feed messages received"),
            &["outcome"],
        )?;

        let feed_reconnects = IntCounter::new(
            "betfair_sync_feed_reconnects_total",
            "Live feed redials",
        )?;

        let feed_connected = Gauge::new(
            "betfair_sync_feed_connected",
            "Feed connection status (1=connected, 0=disconnected)",
        )?;

        let market_book_requests = IntCounterVec::new(
            Opts::new(
                "betfair_sync_market_book_requests_total",
                "listMarketBook calls",
            ),
            &["outcome"],
        )?;

        let runner_writes = IntCounterVec::new(
            Opts::new("betfair_sync_runner_writes_total", "Runner rows written"),
            &["kind"],
        )?;

        let bootstraps = IntCounterVec::new(
            Opts::new("betfair_sync_bootstraps_total", "Game bootstrap attempts"),
            &["outcome"],
        )?;

        let reconcile_runs = IntCounter::new(
            "betfair_sync_reconcile_runs_total",
            "Completed reconciliation passes",
        )?;

        let reconciled_markets = IntCounter::new(
            "betfair_sync_reconciled_markets_total",
            "Markets polled by reconciliation",
        )?;

        let live_games = IntGauge::new("betfair_sync_live_games", "Games in the live set")?;

        let cycle_duration = HistogramVec::new(
            HistogramOpts::new(
                "betfair_sync_cycle_duration_seconds",
                "Processing time per feed batch or reconciliation pass",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["kind"],
        )?;

        // Register all metrics
        registry.register(Box::new(feed_messages.clone()))?;
        registry.register(Box::new(feed_reconnects.clone()))?;
        registry.register(Box::new(feed_connected.clone()))?;
        registry.register(Box::new(market_book_requests.clone()))?;
        registry.register(Box::new(runner_writes.clone()))?;
        registry.register(Box::new(bootstraps.clone()))?;
        registry.register(Box::new(reconcile_runs.clone()))?;
        registry.register(Box::new(reconciled_markets.clone()))?;
        registry.register(Box::new(live_games.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;

        Ok(Self {
            registry,
            feed_messages,
            feed_reconnects,
            feed_connected,
            market_book_requests,
            runner_writes,
            bootstraps,
            reconcile_runs,
            reconciled_markets,
            live_games,
            cycle_duration,
        })
    }

    /// Encode every registered metric in the text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move { metrics.render() }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_exposes_registered_series() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.feed_messages.with_label_values(&["ok"]).inc();
        metrics.runner_writes.with_label_values(&["price"]).inc_by(2);
        metrics.feed_connected.set(1.0);

        let text = metrics.render();
        assert!(text.contains("betfair_sync_feed_messages_total{outcome=\"ok\"} 1"));
        assert!(text.contains("betfair_sync_runner_writes_total{kind=\"price\"} 2"));
        assert!(text.contains("betfair_sync_feed_connected 1"));
    }
}
