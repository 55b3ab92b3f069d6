//! Repository Port - Market Store Interface
//!
//! A narrow façade over the relational store. Every write is an idempotent
//! upsert or an additive insert keyed by natural keys, so replaying a cycle
//! after a crash is harmless.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::domain::{
  EventDetails, EventMarket, EventRunner, GameId, GameMarketId, RunnerId, RunnerPriceSnapshot,
  RunnerStatus,
};

/// Markets the store still considers open, grouped by game.
pub type ActiveMarketsIndex = BTreeMap<GameId, BTreeSet<i64>>;

/// Trait for market store providers.
#[async_trait]
pub trait MarketRepository: Send + Sync {
  /// Upsert the event row for a game.
  async fn add_event(&self, event: &EventDetails) -> anyhow::Result<()>;

  /// Upsert one market of a game.
  async fn add_market(&self, game: GameId, market: &EventMarket) -> anyhow::Result<()>;

  /// Upsert one runner of a market.
  async fn add_runner(&self, market: GameMarketId, runner: &EventRunner) -> anyhow::Result<()>;

  /// Market ids the store knows for a game (empty if the game is new).
  async fn get_market_ids(&self, game: GameId) -> anyhow::Result<Vec<i64>>;

  /// Every market with at least one runner not yet settled.
  async fn get_active_markets(&self) -> anyhow::Result<ActiveMarketsIndex>;

  /// Append a price row for a fully priced runner.
  async fn add_runner_prices(&self, snapshot: &RunnerPriceSnapshot) -> anyhow::Result<()>;

  /// Set a runner's status without touching prices.
  async fn update_runner_status(
    &self,
    market: GameMarketId,
    runner: RunnerId,
    status: &RunnerStatus,
  ) -> anyhow::Result<()>;

  /// Set a market's matched and available totals.
  async fn update_market_totals(
    &self,
    market: GameMarketId,
    total_matched: f64,
    total_available: f64,
  ) -> anyhow::Result<()>;

  /// Release connections. Further calls fail.
  async fn close(&self);
}
