//! In-Memory Repository - Process-local Implementation of the Repository Port
//!
//! Mirrors the stored-function semantics of the Postgres store with
//! ordered maps keyed by natural keys: adds are upserts, price rows are
//! appended, and a market is active while any of its runners is unsettled.
//! Used by the `memory` backend and by tests that need real state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    EventDetails, EventMarket, EventRunner, GameId, GameMarketId, RunnerId, RunnerPriceSnapshot,
    RunnerStatus,
};
use crate::ports::{ActiveMarketsIndex, MarketRepository};

/// Stored runner row.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerRow {
    pub name: String,
    /// `None` until the first book read.
    pub status: Option<RunnerStatus>,
}

/// Stored market row.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketRow {
    pub name: String,
    pub total_matched: Option<f64>,
    pub total_available: Option<f64>,
}

#[derive(Debug, Default)]
struct Tables {
    events: BTreeMap<GameId, EventDetails>,
    markets: BTreeMap<GameMarketId, MarketRow>,
    runners: BTreeMap<(GameMarketId, RunnerId), RunnerRow>,
    prices: Vec<RunnerPriceSnapshot>,
}

/// Process-local market store.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
    closed: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        anyhow::ensure!(
            !self.closed.load(Ordering::Acquire),
            "memory repository is closed"
        );
        Ok(())
    }

    /// Number of stored events, markets and runners.
    pub async fn counts(&self) -> (usize, usize, usize) {
        let t = self.tables.read().await;
        (t.events.len(), t.markets.len(), t.runners.len())
    }

    /// All price rows in insertion order.
    pub async fn price_rows(&self) -> Vec<RunnerPriceSnapshot> {
        self.tables.read().await.prices.clone()
    }

    pub async fn market(&self, market: GameMarketId) -> Option<MarketRow> {
        self.tables.read().await.markets.get(&market).cloned()
    }

    pub async fn runner(&self, market: GameMarketId, runner: RunnerId) -> Option<RunnerRow> {
        self.tables
            .read()
            .await
            .runners
            .get(&(market, runner))
            .cloned()
    }
}

#[async_trait]
impl MarketRepository for MemoryRepository {
    async fn add_event(&self, event: &EventDetails) -> Result<()> {
        self.ensure_open()?;
        let mut row = event.clone();
        row.markets.clear();
        self.tables.write().await.events.insert(event.game_id(), row);
        Ok(())
    }

    async fn add_market(&self, game: GameId, market: &EventMarket) -> Result<()> {
        self.ensure_open()?;
        let key = GameMarketId::new(game, market.id.as_i64());
        let mut t = self.tables.write().await;
        t.markets
            .entry(key)
            .and_modify(|row| row.name.clone_from(&market.name))
            .or_insert_with(|| MarketRow {
                name: market.name.clone(),
                total_matched: None,
                total_available: None,
            });
        Ok(())
    }

    async fn add_runner(&self, market: GameMarketId, runner: &EventRunner) -> Result<()> {
        self.ensure_open()?;
        let mut t = self.tables.write().await;
        t.runners
            .entry((market, runner.id))
            .and_modify(|row| row.name.clone_from(&runner.name))
            .or_insert_with(|| RunnerRow {
                name: runner.name.clone(),
                status: None,
            });
        Ok(())
    }

    async fn get_market_ids(&self, game: GameId) -> Result<Vec<i64>> {
        self.ensure_open()?;
        let t = self.tables.read().await;
        Ok(t.markets
            .keys()
            .filter(|k| k.game == game)
            .map(|k| k.market_id)
            .collect())
    }

    async fn get_active_markets(&self) -> Result<ActiveMarketsIndex> {
        self.ensure_open()?;
        let t = self.tables.read().await;
        let mut index = ActiveMarketsIndex::new();
        for ((market, _), row) in &t.runners {
            let settled = row.status.as_ref().is_some_and(RunnerStatus::is_settled);
            if !settled && t.markets.contains_key(market) {
                index
                    .entry(market.game)
                    .or_default()
                    .insert(market.market_id);
            }
        }
        Ok(index)
    }

    async fn add_runner_prices(&self, snapshot: &RunnerPriceSnapshot) -> Result<()> {
        self.ensure_open()?;
        let mut t = self.tables.write().await;
        t.runners
            .entry((snapshot.market, snapshot.runner_id))
            .or_insert_with(|| RunnerRow {
                name: String::new(),
                status: None,
            })
            .status = Some(snapshot.status.clone());
        t.prices.push(snapshot.clone());
        Ok(())
    }

    async fn update_runner_status(
        &self,
        market: GameMarketId,
        runner: RunnerId,
        status: &RunnerStatus,
    ) -> Result<()> {
        self.ensure_open()?;
        let mut t = self.tables.write().await;
        t.runners
            .entry((market, runner))
            .or_insert_with(|| RunnerRow {
                name: String::new(),
                status: None,
            })
            .status = Some(status.clone());
        Ok(())
    }

    async fn update_market_totals(
        &self,
        market: GameMarketId,
        total_matched: f64,
        total_available: f64,
    ) -> Result<()> {
        self.ensure_open()?;
        let mut t = self.tables.write().await;
        let row = t.markets.entry(market).or_insert_with(|| MarketRow {
            name: String::new(),
            total_matched: None,
            total_available: None,
        });
        row.total_matched = Some(total_matched);
        row.total_available = Some(total_available);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
