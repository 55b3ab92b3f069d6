//! Sync Engine - Live Game to Market Store Synchronization
//!
//! The core use case that, for every feed batch:
//! 1. Refreshes the live set
//! 2. Bootstraps games the store has never seen (event, markets, runners)
//! 3. Batch-polls the game's market books
//! 4. Writes a price row for fully priced runners, a status update otherwise
//!
//! Separately, `reconcile` polls every market the store still considers
//! active for games that left the live set, so their runners pick up the
//! exchange's settled statuses.
//!
//! Error policy: fetch and API failures are logged and skipped; store
//! failures and invariant violations are returned as fatal `SyncError`s.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::SyncConfig;
use crate::domain::{
  FeedBatch, GameId, GameLive, GameMarketId, LiveSet, MarketBook, MarketId, RunnerPriceSnapshot,
  is_priced, split,
};
use crate::error::{Result, SyncError};
use crate::ports::{EventSource, MarketDataApi, MarketRepository, SnapshotHandler};

/// Engine tuning, derived from `[sync]`.
#[derive(Debug, Clone)]
pub struct SyncSettings {
  /// Market ids per `listMarketBook` call.
  pub batch_size: usize,
  /// Market names skipped during bootstrap.
  pub excluded_market_names: Vec<String>,
  /// How long a game stays live without a feed refresh.
  pub live_ttl: Duration,
}

impl From<&SyncConfig> for SyncSettings {
  fn from(c: &SyncConfig) -> Self {
    Self {
      batch_size: c.batch_size,
      excluded_market_names: c.excluded_market_names.clone(),
      live_ttl: Duration::from_secs(c.live_ttl_secs),
    }
  }
}

impl Default for SyncSettings {
  fn default() -> Self {
    Self::from(&SyncConfig::default())
  }
}

/// Counters for one `process_batch` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
  /// Games in the batch.
  pub games: usize,
  /// Games bootstrapped this cycle.
  pub bootstrapped: usize,
  /// Games skipped because their event metadata could not be fetched.
  pub skipped: usize,
  /// `listMarketBook` calls issued.
  pub requests: usize,
  /// Calls that failed and were skipped.
  pub failed_requests: usize,
  /// Market books applied.
  pub books: usize,
  /// Books for markets that were not requested.
  pub discarded_books: usize,
  /// Price rows appended.
  pub price_rows: usize,
  /// Status-only runner updates.
  pub status_rows: usize,
}

/// Counters for one `reconcile` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
  /// Active games in the store.
  pub active_games: usize,
  /// Of those, games no longer live and therefore polled.
  pub stale_games: usize,
  /// Markets polled.
  pub markets: usize,
  pub requests: usize,
  pub failed_requests: usize,
  pub discarded_books: usize,
  /// Status-only runner updates.
  pub status_rows: usize,
}

/// Books gathered for one id list, with request accounting.
#[derive(Debug, Default)]
struct Polled {
  books: Vec<MarketBook>,
  requests: usize,
  failed: usize,
}

/// Synchronizes live games and market books into the store.
pub struct SyncEngine<M: ?Sized, E: ?Sized, R: ?Sized> {
  /// Exchange market-book reader.
  market_data: Arc<M>,
  /// Event metadata for bootstrap.
  events: Arc<E>,
  /// Market store.
  repo: Arc<R>,
  /// Engine tuning.
  settings: SyncSettings,
  /// Games currently considered in play.
  live: LiveSet,
  /// Optional Prometheus metrics.
  metrics: Option<Arc<MetricsRegistry>>,
}

impl<M, E, R> SyncEngine<M, E, R>
where
  M: MarketDataApi + ?Sized,
  E: EventSource + ?Sized,
  R: MarketRepository + ?Sized,
{
  /// Create a new sync engine.
  pub fn new(market_data: Arc<M>, events: Arc<E>, repo: Arc<R>, settings: SyncSettings) -> Self {
    let live = LiveSet::new(settings.live_ttl);
    Self {
      market_data,
      events,
      repo,
      settings,
      live,
      metrics: None,
    }
  }

  /// Attach Prometheus metrics.
  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Current live set.
  pub const fn live_set(&self) -> &LiveSet {
    &self.live
  }

  fn record(&self, f: impl FnOnce(&MetricsRegistry)) {
    if let Some(m) = &self.metrics {
      f(m);
    }
  }

  /// Process one decoded feed message.
  ///
  /// Games are handled in message order. Returns only fatal errors.
  #[instrument(skip(self, batch), fields(games = batch.games.len(), complete = batch.complete))]
  pub async fn process_batch(&mut self, batch: &FeedBatch) -> Result<CycleReport> {
    let now = Instant::now();
    self.live.apply(batch, now);
    let live_games = i64::try_from(self.live.current(now).len()).unwrap_or(i64::MAX);
    self.record(|m| m.live_games.set(live_games));

    let mut report = CycleReport {
      games: batch.games.len(),
      ..CycleReport::default()
    };
    for game in &batch.games {
      self.process_game(game, &mut report).await?;
    }
    Ok(report)
  }

  #[instrument(skip(self, game, report), fields(event_id = game.id, minute = game.minute))]
  async fn process_game(&self, game: &GameLive, report: &mut CycleReport) -> Result<()> {
    let id = game.game_id();
    let mut market_ids = self.market_ids(id).await?;

    if market_ids.is_empty() {
      if !self.bootstrap(game).await? {
        report.skipped += 1;
        return Ok(());
      }
      report.bootstrapped += 1;
      market_ids = self.market_ids(id).await?;
      if market_ids.is_empty() {
        return Err(SyncError::EmptyBootstrap { game: id });
      }
    }

    let requested: BTreeSet<i64> = market_ids.iter().copied().collect();
    let polled = self.poll_books(&market_ids).await;
    report.requests += polled.requests;
    report.failed_requests += polled.failed;

    for book in &polled.books {
      if !requested.contains(&book.market_id.as_i64()) {
        warn!(market_id = %book.market_id, "Discarding book for unrequested market");
        report.discarded_books += 1;
        continue;
      }
      self.apply_book(game, book, report).await?;
      report.books += 1;
    }

    debug!(
      markets = market_ids.len(),
      books = report.books,
      "Game processed"
    );
    Ok(())
  }

  /// Totals once, then one write per runner.
  async fn apply_book(
    &self,
    game: &GameLive,
    book: &MarketBook,
    report: &mut CycleReport,
  ) -> Result<()> {
    let market = GameMarketId::new(game.game_id(), book.market_id.as_i64());

    self
      .repo
      .update_market_totals(market, book.total_matched, book.total_available)
      .await
      .map_err(|e| SyncError::persistence(format!("updating totals of {market}"), e))?;

    for runner in &book.runners {
      if is_priced(runner) {
        let snapshot = RunnerPriceSnapshot::from_book(game, book, runner)?;
        self
          .repo
          .add_runner_prices(&snapshot)
          .await
          .map_err(|e| {
            SyncError::persistence(format!("adding prices of runner {} in {market}", runner.id), e)
          })?;
        report.price_rows += 1;
        self.record(|m| m.runner_writes.with_label_values(&["price"]).inc());
      } else {
        self
          .repo
          .update_runner_status(market, runner.id, &runner.status)
          .await
          .map_err(|e| {
            SyncError::persistence(format!("updating status of runner {} in {market}", runner.id), e)
          })?;
        report.status_rows += 1;
        self.record(|m| m.runner_writes.with_label_values(&["status"]).inc());
      }
    }
    Ok(())
  }

  async fn market_ids(&self, game: GameId) -> Result<Vec<i64>> {
    self
      .repo
      .get_market_ids(game)
      .await
      .map_err(|e| SyncError::persistence(format!("reading markets of {game}"), e))
  }

  /// Fetch and persist event, markets and runners for a new game.
  ///
  /// Returns `Ok(false)` when the metadata could not be fetched.
  async fn bootstrap(&self, game: &GameLive) -> Result<bool> {
    let event = match self.events.fetch_event(game.id).await {
      Ok(event) => event,
      Err(e) => {
        let err = SyncError::Transport(e);
        warn!(event_id = game.id, error = %err, "Event fetch failed, skipping game");
        self.record(|m| m.bootstraps.with_label_values(&["fetch_failed"]).inc());
        return Ok(false);
      }
    };

    let event_game = event.game_id();
    if event_game != game.game_id() {
      warn!(
        feed = %game.game_id(),
        event = %event_game,
        "Event metadata disagrees with feed on game identity"
      );
    }

    self
      .repo
      .add_event(&event)
      .await
      .map_err(|e| SyncError::persistence(format!("adding event {event_game}"), e))?;

    let mut markets = 0usize;
    let mut runners = 0usize;
    for market in event.target_markets(&self.settings.excluded_market_names) {
      self
        .repo
        .add_market(event_game, market)
        .await
        .map_err(|e| SyncError::persistence(format!("adding market {} of {event_game}", market.id), e))?;
      markets += 1;

      let key = GameMarketId::new(event_game, market.id.as_i64());
      for runner in &market.runners {
        self
          .repo
          .add_runner(key, runner)
          .await
          .map_err(|e| SyncError::persistence(format!("adding runner {} of {key}", runner.id), e))?;
        runners += 1;
      }
    }

    self.record(|m| m.bootstraps.with_label_values(&["ok"]).inc());
    info!(
      game = %event_game,
      home = %event.home,
      away = %event.away,
      markets,
      runners,
      skipped_markets = event.markets.len() - markets,
      "Game bootstrapped"
    );
    Ok(true)
  }

  /// Poll books for `ids` in API-sized groups. Failed groups are skipped.
  async fn poll_books(&self, ids: &[i64]) -> Polled {
    let market_ids: Vec<MarketId> = ids.iter().copied().map(MarketId).collect();
    let mut polled = Polled::default();

    for group in split(&market_ids, self.settings.batch_size) {
      polled.requests += 1;
      match self.market_data.list_market_book(&group).await {
        Ok(books) => {
          self.record(|m| m.market_book_requests.with_label_values(&["ok"]).inc());
          polled.books.extend(books);
        }
        Err(e) => {
          polled.failed += 1;
          self.record(|m| m.market_book_requests.with_label_values(&["error"]).inc());
          let err = SyncError::Transport(e);
          warn!(
            markets = group.len(),
            first = %group[0],
            error = %err,
            "listMarketBook failed, skipping group"
          );
        }
      }
    }
    polled
  }

  /// Status-update every active market of games no longer live.
  ///
  /// Games in the live set are never touched, so a game that re-appeared
  /// since the last pass is left to `process_batch`.
  #[instrument(skip(self))]
  pub async fn reconcile(&mut self) -> Result<ReconcileReport> {
    let live = self.live.current(Instant::now());
    let live_games = i64::try_from(live.len()).unwrap_or(i64::MAX);
    self.record(|m| m.live_games.set(live_games));

    let mut active = self
      .repo
      .get_active_markets()
      .await
      .map_err(|e| SyncError::persistence("reading active markets", e))?;

    let mut report = ReconcileReport {
      active_games: active.len(),
      ..ReconcileReport::default()
    };
    active.retain(|game, _| !live.contains(game));
    report.stale_games = active.len();

    for (game, markets) in &active {
      let ids: Vec<i64> = markets.iter().copied().collect();
      report.markets += ids.len();

      let polled = self.poll_books(&ids).await;
      report.requests += polled.requests;
      report.failed_requests += polled.failed;

      for book in &polled.books {
        let market_id = book.market_id.as_i64();
        if !markets.contains(&market_id) {
          warn!(market_id = %book.market_id, "Discarding book for unrequested market");
          report.discarded_books += 1;
          continue;
        }
        let market = GameMarketId::new(*game, market_id);
        for runner in &book.runners {
          self
            .repo
            .update_runner_status(market, runner.id, &runner.status)
            .await
            .map_err(|e| {
              SyncError::persistence(format!("updating status of runner {} in {market}", runner.id), e)
            })?;
          report.status_rows += 1;
          self.record(|m| m.runner_writes.with_label_values(&["status"]).inc());
        }
      }
    }

    let markets = report.markets as u64;
    self.record(|m| {
      m.reconcile_runs.inc();
      m.reconciled_markets.inc_by(markets);
    });
    Ok(report)
  }
}

#[async_trait]
impl<M, E, R> SnapshotHandler for SyncEngine<M, E, R>
where
  M: MarketDataApi + ?Sized + 'static,
  E: EventSource + ?Sized + 'static,
  R: MarketRepository + ?Sized + 'static,
{
  async fn handle_batch(&mut self, batch: FeedBatch) -> Result<()> {
    let started = Instant::now();
    let report = self.process_batch(&batch).await?;
    let elapsed = started.elapsed();
    self.record(|m| {
      m.cycle_duration
        .with_label_values(&["batch"])
        .observe(elapsed.as_secs_f64());
    });

    info!(
      games = report.games,
      bootstrapped = report.bootstrapped,
      skipped = report.skipped,
      books = report.books,
      price_rows = report.price_rows,
      status_rows = report.status_rows,
      failed_requests = report.failed_requests,
      elapsed_ms = elapsed.as_millis(),
      "Feed batch synced"
    );
    Ok(())
  }

  async fn reconcile(&mut self) -> Result<()> {
    let started = Instant::now();
    let report = SyncEngine::reconcile(self).await?;
    let elapsed = started.elapsed();
    self.record(|m| {
      m.cycle_duration
        .with_label_values(&["reconcile"])
        .observe(elapsed.as_secs_f64());
    });

    info!(
      active_games = report.active_games,
      stale_games = report.stale_games,
      markets = report.markets,
      status_rows = report.status_rows,
      failed_requests = report.failed_requests,
      elapsed_ms = elapsed.as_millis(),
      "Reconciliation pass complete"
    );
    Ok(())
  }
}
