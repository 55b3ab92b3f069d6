//! Live Feed Port - Streaming Transport Interface
//!
//! The supervisor dials through a `FeedConnector`, reads text frames from
//! the resulting `FeedConnection`, and hands decoded batches to a
//! `SnapshotHandler`. Transport framing stays inside the adapter.

use async_trait::async_trait;

use crate::domain::FeedBatch;
use crate::error::SyncError;

/// Dials the live feed.
#[async_trait]
pub trait FeedConnector: Send + Sync {
  type Connection: FeedConnection;

  /// Open one connection. The caller bounds this with its own timeout.
  async fn connect(&self) -> anyhow::Result<Self::Connection>;
}

/// One open feed connection.
#[async_trait]
pub trait FeedConnection: Send {
  /// Next text payload; `Ok(None)` when the remote side closed.
  ///
  /// Must be cancel-safe: the supervisor drops this future when the
  /// reconciliation timer or shutdown fires and calls it again later.
  async fn next_message(&mut self) -> anyhow::Result<Option<String>>;

  /// Close the connection, ignoring errors.
  async fn close(&mut self);
}

/// Receives decoded feed batches and reconciliation ticks, one at a time.
#[async_trait]
pub trait SnapshotHandler: Send {
  /// Process one feed message. Only fatal errors are returned.
  async fn handle_batch(&mut self, batch: FeedBatch) -> Result<(), SyncError>;

  /// Close out markets of games no longer live. Only fatal errors are returned.
  async fn reconcile(&mut self) -> Result<(), SyncError>;
}
