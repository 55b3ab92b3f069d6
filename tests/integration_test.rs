//! Integration Tests - Sync Engine against Mocked Ports
//!
//! Tests the interaction between the sync engine, its ports and the
//! in-memory store. Uses mockall for trait mocking and tokio::test for
//! async tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use mockall::predicate::*;
use mockall::{Sequence, mock};

use betfair_live_sync::adapters::metrics::MetricsRegistry;
use betfair_live_sync::adapters::persistence::MemoryRepository;
use betfair_live_sync::domain::{
    EventDetails, EventMarket, EventRunner, FeedBatch, GameId, GameLive, GameMarketId, MarketBook,
    MarketId, PriceSize, Runner, RunnerPriceSnapshot, RunnerStatus,
};
use betfair_live_sync::error::SyncError;
use betfair_live_sync::ports::{ActiveMarketsIndex, MarketRepository};
use betfair_live_sync::usecases::{SyncEngine, SyncSettings};

// ---- Mock Definitions ----

mock! {
    pub MarketData {}

    #[async_trait::async_trait]
    impl betfair_live_sync::ports::MarketDataApi for MarketData {
        async fn list_market_book(&self, market_ids: &[MarketId]) -> anyhow::Result<Vec<MarketBook>>;
    }
}

mock! {
    pub Events {}

    #[async_trait::async_trait]
    impl betfair_live_sync::ports::EventSource for Events {
        async fn fetch_event(&self, event_id: i64) -> anyhow::Result<EventDetails>;
    }
}

mock! {
    pub Repo {}

    #[async_trait::async_trait]
    impl betfair_live_sync::ports::MarketRepository for Repo {
        async fn add_event(&self, event: &EventDetails) -> anyhow::Result<()>;
        async fn add_market(&self, game: GameId, market: &EventMarket) -> anyhow::Result<()>;
        async fn add_runner(&self, market: GameMarketId, runner: &EventRunner) -> anyhow::Result<()>;
        async fn get_market_ids(&self, game: GameId) -> anyhow::Result<Vec<i64>>;
        async fn get_active_markets(&self) -> anyhow::Result<ActiveMarketsIndex>;
        async fn add_runner_prices(&self, snapshot: &RunnerPriceSnapshot) -> anyhow::Result<()>;
        async fn update_runner_status(
            &self,
            market: GameMarketId,
            runner: i64,
            status: &RunnerStatus,
        ) -> anyhow::Result<()>;
        async fn update_market_totals(
            &self,
            market: GameMarketId,
            total_matched: f64,
            total_available: f64,
        ) -> anyhow::Result<()>;
        async fn close(&self);
    }
}

// ---- Fixtures ----

fn kickoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap()
}

fn game(id: i64, minute: i32) -> GameLive {
    GameLive {
        id,
        open_date: kickoff(),
        minute,
        score_home: 1,
        score_away: 0,
    }
}

fn live(games: Vec<GameLive>) -> FeedBatch {
    FeedBatch {
        games,
        complete: true,
    }
}

fn ladder(levels: usize, base: f64) -> Vec<PriceSize> {
    (0..levels)
        .map(|i| PriceSize::new(base + i as f64 * 0.02, 25.0))
        .collect()
}

fn runner(id: i64, status: RunnerStatus, levels: usize) -> Runner {
    Runner {
        id,
        status,
        last_price_traded: Some(2.0),
        available_to_back: ladder(levels, 1.98),
        available_to_lay: ladder(levels, 2.02),
    }
}

fn book(market: i64, runners: Vec<Runner>) -> MarketBook {
    MarketBook {
        market_id: MarketId(market),
        total_matched: 15_000.0,
        total_available: 3_200.0,
        runners,
    }
}

fn match_odds_event(id: i64) -> EventDetails {
    EventDetails {
        id,
        open_date: kickoff(),
        competition_id: 10_932_509,
        competition_name: "Premier League".to_string(),
        home: "Arsenal".to_string(),
        away: "Chelsea".to_string(),
        country_code: "GB".to_string(),
        markets: vec![
            EventMarket {
                id: MarketId(555),
                name: "Match Odds".to_string(),
                runners: vec![
                    EventRunner {
                        id: 1,
                        name: "Arsenal".to_string(),
                    },
                    EventRunner {
                        id: 2,
                        name: "Chelsea".to_string(),
                    },
                ],
            },
            EventMarket {
                id: MarketId(556),
                name: "Asian Handicap".to_string(),
                runners: vec![EventRunner {
                    id: 3,
                    name: "Arsenal -0.5".to_string(),
                }],
            },
        ],
    }
}

fn engine<R: MarketRepository>(
    api: MockMarketData,
    events: MockEvents,
    repo: Arc<R>,
) -> SyncEngine<MockMarketData, MockEvents, R> {
    SyncEngine::new(
        Arc::new(api),
        Arc::new(events),
        repo,
        SyncSettings::default(),
    )
}

async fn seed(repo: &MemoryRepository, game: GameId, markets: &[i64]) {
    let mut ev = match_odds_event(game.event_id);
    ev.open_date = game.open_date;
    ev.markets.clear();
    repo.add_event(&ev).await.unwrap();
    for &m in markets {
        let market = EventMarket {
            id: MarketId(m),
            name: format!("Market {m}"),
            runners: Vec::new(),
        };
        repo.add_market(game, &market).await.unwrap();
        let key = GameMarketId::new(game, m);
        for r in [1, 2] {
            repo.add_runner(
                key,
                &EventRunner {
                    id: r,
                    name: format!("Runner {r}"),
                },
            )
            .await
            .unwrap();
        }
    }
}

// ---- Integration Tests ----

#[tokio::test]
async fn test_new_game_is_bootstrapped_before_any_book_write() {
    let g = game(100, 10);
    let id = g.game_id();
    let mut seq = Sequence::new();

    let mut repo = MockRepo::new();
    let mut events = MockEvents::new();
    let mut api = MockMarketData::new();

    // Empty before bootstrap, populated after.
    let mut lookups = 0;
    repo.expect_get_market_ids()
        .with(eq(id))
        .times(2)
        .returning(move |_| {
            lookups += 1;
            Ok(if lookups == 1 { Vec::new() } else { vec![555] })
        });
    events
        .expect_fetch_event()
        .with(eq(100))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|id| Ok(match_odds_event(id)));
    repo.expect_add_event()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    repo.expect_add_market()
        .withf(|_, m| m.id == MarketId(555))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    repo.expect_add_runner()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    api.expect_list_market_book()
        .withf(|ids| ids.to_vec() == [MarketId(555)])
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Ok(vec![book(
                555,
                vec![
                    runner(1, RunnerStatus::Active, 3),
                    runner(2, RunnerStatus::Active, 3),
                ],
            )])
        });
    repo.expect_update_market_totals()
        .withf(|m, matched, available| {
            m.market_id == 555 && *matched == 15_000.0 && *available == 3_200.0
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));
    repo.expect_add_runner_prices()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let mut engine = engine(api, events, Arc::new(repo));
    let report = engine.process_batch(&live(vec![g])).await.unwrap();

    assert_eq!(report.bootstrapped, 1);
    assert_eq!(report.price_rows, 2);
    assert_eq!(report.status_rows, 0);
}

#[tokio::test]
async fn test_failed_event_fetch_skips_game_without_writes() {
    let mut repo = MockRepo::new();
    let mut events = MockEvents::new();
    let api = MockMarketData::new();

    repo.expect_get_market_ids()
        .times(1)
        .returning(|_| Ok(Vec::new()));
    events
        .expect_fetch_event()
        .times(1)
        .returning(|_| Err(anyhow::anyhow!("connection refused")));

    let mut engine = engine(api, events, Arc::new(repo));
    let report = engine.process_batch(&live(vec![game(100, 10)])).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.bootstrapped, 0);
    assert_eq!(report.requests, 0);
}

#[tokio::test]
async fn test_bootstrap_that_stores_no_markets_is_fatal() {
    let mut repo = MockRepo::new();
    let mut events = MockEvents::new();
    let api = MockMarketData::new();

    repo.expect_get_market_ids()
        .times(2)
        .returning(|_| Ok(Vec::new()));
    events.expect_fetch_event().times(1).returning(|id| {
        let mut ev = match_odds_event(id);
        ev.markets.retain(|m| m.name == "Asian Handicap");
        Ok(ev)
    });
    repo.expect_add_event().times(1).returning(|_| Ok(()));

    let mut engine = engine(api, events, Arc::new(repo));
    let err = engine
        .process_batch(&live(vec![game(100, 10)]))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, SyncError::EmptyBootstrap { game } if game.event_id == 100));
}

#[tokio::test]
async fn test_end_to_end_prices_then_status_only_follow_up() {
    let repo = Arc::new(MemoryRepository::new());
    let mut events = MockEvents::new();
    let mut api = MockMarketData::new();

    events
        .expect_fetch_event()
        .times(1)
        .returning(|id| Ok(match_odds_event(id)));

    // Full ladders on the first read; runner 1 loses a back level on the second.
    let mut reads = 0;
    api.expect_list_market_book()
        .withf(|ids| ids.to_vec() == [MarketId(555)])
        .times(2)
        .returning(move |_| {
            reads += 1;
            let mut first = runner(1, RunnerStatus::Active, 3);
            if reads > 1 {
                first.available_to_back = ladder(2, 1.98);
            }
            Ok(vec![book(
                555,
                vec![first, runner(2, RunnerStatus::Active, 3)],
            )])
        });

    let mut engine = engine(api, events, Arc::clone(&repo));

    let first = engine.process_batch(&live(vec![game(100, 10)])).await.unwrap();
    assert_eq!(first.bootstrapped, 1);
    assert_eq!(first.price_rows, 2);

    let rows = repo.price_rows().await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.minute == 10 && r.score_home == 1));
    assert_eq!(rows[0].back[0].price, 1.98);
    assert!((rows[0].lay[2].price - 2.06).abs() < 1e-9);

    let key = GameMarketId::new(game(100, 0).game_id(), 555);
    let market = repo.market(key).await.unwrap();
    assert_eq!(market.total_matched, Some(15_000.0));
    assert_eq!(market.total_available, Some(3_200.0));

    // Asian handicap never reaches the store.
    assert_eq!(repo.counts().await, (1, 1, 2));

    let second = engine.process_batch(&live(vec![game(100, 11)])).await.unwrap();
    assert_eq!(second.bootstrapped, 0);
    assert_eq!(second.price_rows, 1);
    assert_eq!(second.status_rows, 1);

    let rows = repo.price_rows().await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].runner_id, 2);
    assert_eq!(rows[2].minute, 11);
    assert_eq!(
        repo.runner(key, 1).await.unwrap().status,
        Some(RunnerStatus::Active)
    );
}

#[tokio::test]
async fn test_reconcile_polls_only_games_absent_from_live_set() {
    let repo = Arc::new(MemoryRepository::new());
    let g1 = game(1, 30);
    let g2 = game(2, 0);
    seed(&repo, g1.game_id(), &[10, 11]).await;
    seed(&repo, g2.game_id(), &[20]).await;

    let events = MockEvents::new();
    let mut api = MockMarketData::new();
    api.expect_list_market_book()
        .withf(|ids| ids.to_vec() == [MarketId(10), MarketId(11)])
        .times(1)
        .returning(|_| Ok(Vec::new()));
    api.expect_list_market_book()
        .withf(|ids| ids.to_vec() == [MarketId(20)])
        .times(1)
        .returning(|_| {
            Ok(vec![book(
                20,
                vec![
                    runner(1, RunnerStatus::Winner, 0),
                    runner(2, RunnerStatus::Loser, 0),
                ],
            )])
        });

    let mut engine = engine(api, events, Arc::clone(&repo));
    engine.process_batch(&live(vec![g1.clone()])).await.unwrap();

    let report = engine.reconcile().await.unwrap();
    assert_eq!(report.active_games, 2);
    assert_eq!(report.stale_games, 1);
    assert_eq!(report.markets, 1);
    assert_eq!(report.status_rows, 2);

    let g2_market = GameMarketId::new(g2.game_id(), 20);
    assert_eq!(
        repo.runner(g2_market, 1).await.unwrap().status,
        Some(RunnerStatus::Winner)
    );
    assert_eq!(
        repo.runner(g2_market, 2).await.unwrap().status,
        Some(RunnerStatus::Loser)
    );

    let still_active: BTreeSet<GameId> = repo
        .get_active_markets()
        .await
        .unwrap()
        .into_keys()
        .collect();
    assert_eq!(still_active, BTreeSet::from([g1.game_id()]));
}

#[tokio::test]
async fn test_game_that_reappears_is_not_reconciled() {
    let repo = Arc::new(MemoryRepository::new());
    let g1 = game(1, 30);
    seed(&repo, g1.game_id(), &[10]).await;

    let events = MockEvents::new();
    let mut api = MockMarketData::new();
    api.expect_list_market_book()
        .times(2)
        .returning(|_| Ok(Vec::new()));

    let mut engine = engine(api, events, Arc::clone(&repo));
    engine.process_batch(&live(vec![g1.clone()])).await.unwrap();
    engine.process_batch(&live(Vec::new())).await.unwrap();
    engine.process_batch(&live(vec![g1])).await.unwrap();

    let report = engine.reconcile().await.unwrap();
    assert_eq!(report.stale_games, 0);
    assert_eq!(report.requests, 0);
}

#[tokio::test]
async fn test_books_for_unrequested_markets_are_discarded() {
    let repo = Arc::new(MemoryRepository::new());
    let g = game(7, 50);
    seed(&repo, g.game_id(), &[70]).await;

    let events = MockEvents::new();
    let mut api = MockMarketData::new();
    api.expect_list_market_book().times(1).returning(|_| {
        Ok(vec![
            book(70, vec![runner(1, RunnerStatus::Active, 3)]),
            book(999, vec![runner(9, RunnerStatus::Active, 3)]),
        ])
    });

    let mut engine = engine(api, events, Arc::clone(&repo));
    let report = engine.process_batch(&live(vec![g.clone()])).await.unwrap();

    assert_eq!(report.books, 1);
    assert_eq!(report.discarded_books, 1);
    assert_eq!(report.price_rows, 1);
    assert!(repo
        .market(GameMarketId::new(g.game_id(), 999))
        .await
        .is_none());
}

#[tokio::test]
async fn test_failed_batch_is_skipped_and_rest_applied() {
    let repo = Arc::new(MemoryRepository::new());
    let g = game(8, 60);
    let ids: Vec<i64> = (1000..1045).collect();
    seed(&repo, g.game_id(), &ids).await;

    let events = MockEvents::new();
    let mut api = MockMarketData::new();
    api.expect_list_market_book()
        .withf(|ids| ids.len() == 40)
        .times(1)
        .returning(|_| Err(anyhow::anyhow!("503 Service Unavailable")));
    api.expect_list_market_book()
        .withf(|ids| ids.len() == 5)
        .times(1)
        .returning(|ids| {
            Ok(ids
                .iter()
                .map(|id| book(id.as_i64(), vec![runner(1, RunnerStatus::Active, 1)]))
                .collect())
        });

    let mut engine = engine(api, events, Arc::clone(&repo));
    let report = engine.process_batch(&live(vec![g])).await.unwrap();

    assert_eq!(report.requests, 2);
    assert_eq!(report.failed_requests, 1);
    assert_eq!(report.books, 5);
    assert_eq!(report.status_rows, 5);
}

#[tokio::test]
async fn test_store_failure_is_fatal() {
    let mut repo = MockRepo::new();
    let events = MockEvents::new();
    let mut api = MockMarketData::new();

    repo.expect_get_market_ids().returning(|_| Ok(vec![555]));
    api.expect_list_market_book()
        .returning(|_| Ok(vec![book(555, vec![runner(1, RunnerStatus::Active, 3)])]));
    repo.expect_update_market_totals()
        .times(1)
        .returning(|_, _, _| Err(anyhow::anyhow!("connection reset by peer")));

    let mut engine = engine(api, events, Arc::new(repo));
    let err = engine
        .process_batch(&live(vec![game(100, 10)]))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, SyncError::Persistence { .. }));
}

#[tokio::test]
async fn test_single_object_message_keeps_other_games_live() {
    let repo = Arc::new(MemoryRepository::new());
    let g1 = game(1, 10);
    let g2 = game(2, 10);
    seed(&repo, g1.game_id(), &[10]).await;
    seed(&repo, g2.game_id(), &[20]).await;

    let events = MockEvents::new();
    let mut api = MockMarketData::new();
    api.expect_list_market_book().returning(|_| Ok(Vec::new()));

    let mut engine = engine(api, events, Arc::clone(&repo));
    engine
        .process_batch(&live(vec![g1.clone(), g2.clone()]))
        .await
        .unwrap();
    engine
        .process_batch(&FeedBatch {
            games: vec![g2],
            complete: false,
        })
        .await
        .unwrap();

    assert_eq!(engine.live_set().len(), 2);
    assert!(engine.live_set().contains(&g1.game_id()));
}

#[tokio::test]
async fn test_live_games_gauge_excludes_expired_games() {
    let repo = Arc::new(MemoryRepository::new());
    let g1 = game(1, 10);
    let g2 = game(2, 10);
    seed(&repo, g1.game_id(), &[10]).await;
    seed(&repo, g2.game_id(), &[20]).await;

    let events = MockEvents::new();
    let mut api = MockMarketData::new();
    api.expect_list_market_book().returning(|_| Ok(Vec::new()));

    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let settings = SyncSettings {
        live_ttl: Duration::from_millis(5),
        ..SyncSettings::default()
    };
    let mut engine = SyncEngine::new(Arc::new(api), Arc::new(events), Arc::clone(&repo), settings)
        .with_metrics(Arc::clone(&metrics));

    engine
        .process_batch(&live(vec![g1.clone(), g2.clone()]))
        .await
        .unwrap();
    assert_eq!(metrics.live_games.get(), 2);

    tokio::time::sleep(Duration::from_millis(50)).await;
    engine
        .process_batch(&FeedBatch {
            games: vec![g2],
            complete: false,
        })
        .await
        .unwrap();

    assert_eq!(metrics.live_games.get(), 1);
    assert!(!engine.live_set().contains(&g1.game_id()));
}
