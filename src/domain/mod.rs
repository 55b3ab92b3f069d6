//! Domain layer - Identity types, market books and pure sync rules.
//!
//! Nothing in here performs I/O. Batching, price classification, feed
//! decoding and live-set bookkeeping are plain functions over these types
//! so they can be tested and benchmarked in isolation.

pub mod batch;
pub mod event;
pub mod game;
pub mod live;
pub mod market_book;

// Re-export core types for convenience
pub use batch::{MARKET_BOOK_BATCH_LIMIT, split};
pub use event::{DEFAULT_EXCLUDED_MARKETS, EventDetails, EventMarket, EventRunner};
pub use game::{GameId, GameLive, GameMarketId, MarketId, RunnerId};
pub use live::{FeedBatch, LiveSet, decode_message};
pub use market_book::{
    ORDER_BOOK_DEPTH, MarketBook, PriceSize, Runner, RunnerPriceSnapshot, RunnerStatus, is_priced,
};
