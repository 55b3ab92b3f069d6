//! Liveness and Readiness Probes
//!
//! `/live` answers as long as the process serves HTTP. `/ready` reports a
//! JSON snapshot of the feed connection and the engine, and answers 503
//! until the feed is connected or after the engine stopped on a fatal
//! error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Flags flipped by the supervisor and read by the probes.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// A feed connection is open.
    pub feed_connected: Arc<AtomicBool>,
    /// Cleared once the engine hit a fatal error or shut down.
    pub engine_running: Arc<AtomicBool>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Feed down, engine up.
    pub fn new() -> Self {
        Self {
            feed_connected: Arc::new(AtomicBool::new(false)),
            engine_running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_feed_connected(&self, connected: bool) {
        self.feed_connected.store(connected, Ordering::Relaxed);
    }

    pub fn set_engine_running(&self, running: bool) {
        self.engine_running.store(running, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.report().ready
    }

    /// Point-in-time view served by `/ready`.
    pub fn report(&self) -> HealthReport {
        let feed_connected = self.feed_connected.load(Ordering::Relaxed);
        let engine_running = self.engine_running.load(Ordering::Relaxed);
        HealthReport {
            ready: feed_connected && engine_running,
            feed_connected,
            engine_running,
        }
    }
}

/// Body of the `/ready` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub ready: bool,
    pub feed_connected: bool,
    pub engine_running: bool,
}

/// Probe server on `0.0.0.0:<health_port>`.
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub const fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Serve probes until the shutdown broadcast fires.
    #[instrument(skip(self, shutdown_rx), fields(port = self.port))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let router = Router::new()
            .route("/live", get(|| async { "alive" }))
            .route("/ready", get(ready))
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(("0.0.0.0", self.port)).await?;
        info!(port = self.port, "Probe server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;
        Ok(())
    }
}

async fn ready(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.report();
    let status = if report.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
