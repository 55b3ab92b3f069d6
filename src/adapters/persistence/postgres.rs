//! Postgres Repository - Stored-Function Adapter for the Repository Port
//!
//! Every write goes through a stored function that upserts on natural
//! keys, so the adapter itself holds no state beyond the pool. Reads come
//! from `get_markets_ids_by_event_id` and the `active_markets` view.
//!
//! Expected signatures use `bigint` for event, market and selection ids,
//! `timestamptz` for open dates and `double precision` for amounts.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{debug, info, instrument};

use crate::config::PersistenceConfig;
use crate::domain::{
    EventDetails, EventMarket, EventRunner, GameId, GameMarketId, RunnerId, RunnerPriceSnapshot,
    RunnerStatus,
};
use crate::ports::{ActiveMarketsIndex, MarketRepository};

/// One row of the `active_markets` view.
#[derive(Debug, sqlx::FromRow)]
struct ActiveMarketRow {
    event_id: i64,
    open_date: DateTime<Utc>,
    market_id: i64,
}

/// Postgres-backed market store.
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Wrap an existing pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from persistence config.
    pub async fn connect(config: &PersistenceConfig) -> Result<Self> {
        info!(
            max_connections = config.max_connections,
            acquire_timeout_secs = config.acquire_timeout_secs,
            "Creating database pool"
        );

        let connect_opts = PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(connect_opts)
            .await
            .context("Failed to create database pool")?;

        info!("Database pool created successfully");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl MarketRepository for PgRepository {
    #[instrument(skip(self, event), fields(event_id = event.id))]
    async fn add_event(&self, event: &EventDetails) -> Result<()> {
        sqlx::query("SELECT add_event($1, $2, $3, $4, $5, $6, $7)")
            .bind(event.id)
            .bind(event.open_date)
            .bind(event.competition_id)
            .bind(&event.competition_name)
            .bind(&event.home)
            .bind(&event.away)
            .bind(&event.country_code)
            .execute(&self.pool)
            .await
            .with_context(|| format!("add_event({})", event.id))?;
        Ok(())
    }

    async fn add_market(&self, game: GameId, market: &EventMarket) -> Result<()> {
        sqlx::query("SELECT add_market($1, $2, $3, $4)")
            .bind(game.event_id)
            .bind(game.open_date)
            .bind(market.id.as_i64())
            .bind(&market.name)
            .execute(&self.pool)
            .await
            .with_context(|| format!("add_market({game}, {})", market.id))?;
        Ok(())
    }

    async fn add_runner(&self, market: GameMarketId, runner: &EventRunner) -> Result<()> {
        sqlx::query("SELECT add_runner($1, $2, $3, $4, $5)")
            .bind(market.game.event_id)
            .bind(market.game.open_date)
            .bind(market.market_id)
            .bind(runner.id)
            .bind(&runner.name)
            .execute(&self.pool)
            .await
            .with_context(|| format!("add_runner({market}, {})", runner.id))?;
        Ok(())
    }

    async fn get_market_ids(&self, game: GameId) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT m::bigint FROM get_markets_ids_by_event_id($1, $2) AS m",
        )
        .bind(game.event_id)
        .bind(game.open_date)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("get_markets_ids_by_event_id({game})"))?;

        debug!(%game, markets = ids.len(), "Known markets loaded");
        Ok(ids)
    }

    async fn get_active_markets(&self) -> Result<ActiveMarketsIndex> {
        let rows = sqlx::query_as::<_, ActiveMarketRow>(
            "SELECT event_id::bigint AS event_id, open_date, market_id::bigint AS market_id \
             FROM active_markets",
        )
        .fetch_all(&self.pool)
        .await
        .context("SELECT FROM active_markets")?;

        let mut index = ActiveMarketsIndex::new();
        for row in rows {
            index
                .entry(GameId::new(row.event_id, row.open_date))
                .or_default()
                .insert(row.market_id);
        }
        Ok(index)
    }

    async fn add_runner_prices(&self, s: &RunnerPriceSnapshot) -> Result<()> {
        let [b0, b1, b2] = s.back;
        let [l0, l1, l2] = s.lay;

        sqlx::query(
            "SELECT add_runner_prices(\
                $1, $2, $3, $4, $5, $6, $7, $8, \
                $9, $10, $11, $12, $13, $14, \
                $15, $16, $17, $18, $19, $20, \
                $21, $22, $23)",
        )
        .bind(s.market.game.event_id)
        .bind(s.market.game.open_date)
        .bind(s.market.market_id)
        .bind(s.runner_id)
        .bind(s.status.as_str())
        .bind(s.minute)
        .bind(s.score_home)
        .bind(s.score_away)
        .bind(b0.price)
        .bind(b1.price)
        .bind(b2.price)
        .bind(b0.size)
        .bind(b1.size)
        .bind(b2.size)
        .bind(l0.price)
        .bind(l1.price)
        .bind(l2.price)
        .bind(l0.size)
        .bind(l1.size)
        .bind(l2.size)
        .bind(s.total_matched)
        .bind(s.total_available)
        .bind(s.last_price_traded)
        .execute(&self.pool)
        .await
        .with_context(|| format!("add_runner_prices({}, {})", s.market, s.runner_id))?;
        Ok(())
    }

    async fn update_runner_status(
        &self,
        market: GameMarketId,
        runner: RunnerId,
        status: &RunnerStatus,
    ) -> Result<()> {
        sqlx::query("SELECT update_runner_status($1, $2, $3, $4, $5)")
            .bind(market.game.event_id)
            .bind(market.game.open_date)
            .bind(market.market_id)
            .bind(runner)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("update_runner_status({market}, {runner}, {status})"))?;
        Ok(())
    }

    async fn update_market_totals(
        &self,
        market: GameMarketId,
        total_matched: f64,
        total_available: f64,
    ) -> Result<()> {
        sqlx::query("SELECT update_market_totals($1, $2, $3, $4, $5)")
            .bind(market.game.event_id)
            .bind(market.game.open_date)
            .bind(market.market_id)
            .bind(total_matched)
            .bind(total_available)
            .execute(&self.pool)
            .await
            .with_context(|| format!("update_market_totals({market})"))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
