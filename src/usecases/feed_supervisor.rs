//! Feed Supervisor - Reconnecting Live Feed Loop
//!
//! Owns the single stream of control: dial the feed, read one message at
//! a time, decode it and hand it to the handler before reading the next.
//! The reconciliation timer is polled in the same `select!`, so a
//! reconciliation pass never overlaps message processing.
//!
//! Failure policy:
//! - Malformed message: logged and counted, connection kept
//! - Read error or remote close: connection closed, redial at once
//! - Dial failure or handshake timeout: wait `dial_retry`, dial again
//! - Fatal handler error: loop ends with that error

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::config::AppConfig;
use crate::domain::decode_message;
use crate::error::{Result, SyncError};
use crate::ports::{FeedConnection, FeedConnector, SnapshotHandler};

/// Timing knobs for the supervisor loop.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
  /// Bound on a single dial.
  pub handshake_timeout: Duration,
  /// Wait between failed dials.
  pub dial_retry: Duration,
  /// Period of the reconciliation timer.
  pub reconcile_interval: Duration,
}

impl From<&AppConfig> for SupervisorSettings {
  fn from(c: &AppConfig) -> Self {
    Self {
      handshake_timeout: Duration::from_secs(c.feed.handshake_timeout_secs),
      dial_retry: Duration::from_secs(c.feed.dial_retry_secs),
      reconcile_interval: Duration::from_secs(c.sync.reconcile_interval_secs),
    }
  }
}

/// Why a connection's read loop ended.
enum SessionEnd {
  Shutdown,
  Disconnected,
}

/// Drives the feed connection and the reconciliation timer.
pub struct FeedSupervisor<C: FeedConnector, H: SnapshotHandler> {
  /// Feed transport.
  connector: C,
  /// Receives batches and reconciliation ticks.
  handler: H,
  settings: SupervisorSettings,
  metrics: Option<Arc<MetricsRegistry>>,
  health: Option<Arc<HealthState>>,
}

impl<C: FeedConnector, H: SnapshotHandler> FeedSupervisor<C, H> {
  /// Create a new supervisor.
  pub const fn new(connector: C, handler: H, settings: SupervisorSettings) -> Self {
    Self {
      connector,
      handler,
      settings,
      metrics: None,
      health: None,
    }
  }

  /// Attach Prometheus metrics.
  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Attach the readiness state.
  #[must_use]
  pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
    self.health = Some(health);
    self
  }

  /// Give back the handler, e.g. to inspect it after `run`.
  pub fn into_handler(self) -> H {
    self.handler
  }

  fn record(&self, f: impl FnOnce(&MetricsRegistry)) {
    if let Some(m) = &self.metrics {
      f(m);
    }
  }

  fn set_connected(&self, connected: bool) {
    if let Some(h) = &self.health {
      h.set_feed_connected(connected);
    }
    self.record(|m| m.feed_connected.set(if connected { 1.0 } else { 0.0 }));
  }

  /// Run until shutdown or a fatal error.
  #[instrument(skip(self, shutdown_rx), name = "feed_supervisor")]
  pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
    let period = self.settings.reconcile_interval;
    let mut reconcile = interval_at(Instant::now() + period, period);
    reconcile.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
      reconcile_secs = period.as_secs(),
      handshake_timeout_secs = self.settings.handshake_timeout.as_secs(),
      "Feed supervisor started"
    );

    loop {
      let dial = tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
          info!("Shutdown signal received before dial");
          return Ok(());
        }
        res = timeout(self.settings.handshake_timeout, self.connector.connect()) => res,
      };

      let mut conn = match dial {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
          warn!(error = %format!("{e:#}"), retry_secs = self.settings.dial_retry.as_secs(), "Feed dial failed");
          if self.wait_before_redial(&mut shutdown_rx, &mut reconcile).await? {
            return Ok(());
          }
          continue;
        }
        Err(_) => {
          warn!(
            timeout_secs = self.settings.handshake_timeout.as_secs(),
            "Feed handshake timed out"
          );
          if self.wait_before_redial(&mut shutdown_rx, &mut reconcile).await? {
            return Ok(());
          }
          continue;
        }
      };

      self.set_connected(true);
      info!("Live feed connected");

      let end = self.session(&mut conn, &mut shutdown_rx, &mut reconcile).await;
      conn.close().await;
      self.set_connected(false);

      match end? {
        SessionEnd::Shutdown => {
          info!("Feed supervisor stopped");
          return Ok(());
        }
        SessionEnd::Disconnected => {
          self.record(|m| m.feed_reconnects.inc());
          info!("Redialing live feed");
        }
      }
    }
  }

  /// Sleep `dial_retry`, still serving reconciliation ticks.
  ///
  /// Returns `true` if shutdown arrived meanwhile.
  async fn wait_before_redial(
    &mut self,
    shutdown_rx: &mut broadcast::Receiver<()>,
    reconcile: &mut Interval,
  ) -> Result<bool> {
    let wake = sleep(self.settings.dial_retry);
    tokio::pin!(wake);
    loop {
      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => return Ok(true),
        _ = reconcile.tick() => self.reconcile().await?,
        () = &mut wake => return Ok(false),
      }
    }
  }

  /// Read loop for one connection.
  async fn session(
    &mut self,
    conn: &mut C::Connection,
    shutdown_rx: &mut broadcast::Receiver<()>,
    reconcile: &mut Interval,
  ) -> Result<SessionEnd> {
    loop {
      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => return Ok(SessionEnd::Shutdown),
        _ = reconcile.tick() => self.reconcile().await?,
        msg = conn.next_message() => match msg {
          Ok(Some(text)) => self.dispatch(&text).await?,
          Ok(None) => {
            info!("Live feed closed by remote");
            return Ok(SessionEnd::Disconnected);
          }
          Err(e) => {
            warn!(error = %format!("{e:#}"), "Live feed read failed");
            return Ok(SessionEnd::Disconnected);
          }
        },
      }
    }
  }

  async fn dispatch(&mut self, text: &str) -> Result<()> {
    let batch = match decode_message(text) {
      Ok(batch) => batch,
      Err(e) => {
        self.record(|m| m.feed_messages.with_label_values(&["decode_error"]).inc());
        let err = SyncError::from(e);
        warn!(error = %err, len = text.len(), "Skipping feed message");
        return Ok(());
      }
    };

    self.record(|m| m.feed_messages.with_label_values(&["ok"]).inc());
    debug!(games = batch.games.len(), complete = batch.complete, "Feed message decoded");
    let outcome = self.handler.handle_batch(batch).await;
    self.absorb(outcome)
  }

  async fn reconcile(&mut self) -> Result<()> {
    let outcome = self.handler.reconcile().await;
    self.absorb(outcome)
  }

  /// Propagate fatal errors, log the rest.
  fn absorb(&self, outcome: Result<()>) -> Result<()> {
    match outcome {
      Err(e) if e.is_fatal() => {
        if let Some(h) = &self.health {
          h.set_engine_running(false);
        }
        Err(e)
      }
      Err(e) => {
        warn!(error = %e, "Recoverable handler error");
        Ok(())
      }
      Ok(()) => Ok(()),
    }
  }
}
