//! Event Source Port - Event Metadata Interface

use async_trait::async_trait;

use crate::domain::EventDetails;

/// Trait for event-metadata providers used during bootstrap.
#[async_trait]
pub trait EventSource: Send + Sync {
  /// Fetch the full event (competition, teams, markets, runners).
  ///
  /// Transport failures and malformed bodies are both reported as errors;
  /// the engine treats either as "skip this game for now".
  async fn fetch_event(&self, event_id: i64) -> anyhow::Result<EventDetails>;
}
