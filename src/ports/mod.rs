//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the sync engine requires from the
//! outside world. Adapters implement these traits; tests mock them.
//!
//! Port categories:
//! - `MarketDataApi`: Batched market-book reads from the exchange
//! - `EventSource`: Event metadata for bootstrapping new games
//! - `MarketRepository`: Relational store behind idempotent operations
//! - `FeedConnector`: Live-game stream transport

pub mod event_source;
pub mod live_feed;
pub mod market_data;
pub mod repository;

pub use event_source::EventSource;
pub use live_feed::{FeedConnection, FeedConnector, SnapshotHandler};
pub use market_data::MarketDataApi;
pub use repository::{ActiveMarketsIndex, MarketRepository};
