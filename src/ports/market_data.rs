//! Market Data Port - Exchange Market-Book Interface
//!
//! Read-only access to current order books. One call covers at most
//! `MARKET_BOOK_BATCH_LIMIT` markets; callers batch with `domain::split`.

use async_trait::async_trait;

use crate::domain::{MarketBook, MarketId};

/// Trait for market-book providers.
#[async_trait]
pub trait MarketDataApi: Send + Sync {
  /// Fetch best-offers books for the given markets.
  ///
  /// Books may come back in any order and need not cover every id; markets
  /// the exchange no longer knows are simply absent.
  async fn list_market_book(&self, market_ids: &[MarketId]) -> anyhow::Result<Vec<MarketBook>>;
}
