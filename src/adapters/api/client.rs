//! Exchange HTTP Client - Rate-limited Market-Book Reader
//!
//! Wraps reqwest with a governor rate limiter and the application/session
//! headers for the exchange betting API. Implements the `MarketDataApi`
//! port.
//!
//! Each call is a single request. A failed group is skipped by the engine
//! for that cycle and simply requested again on the next feed message.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use tracing::{debug, instrument, warn};

use super::types::{ListMarketBookRequest, MarketBookResponse};
use crate::config::BetfairConfig;
use crate::domain::{MARKET_BOOK_BATCH_LIMIT, MarketBook, MarketId};
use crate::ports::MarketDataApi;

const LIST_MARKET_BOOK: &str = "/listMarketBook/";

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Configuration for the exchange HTTP client.
#[derive(Debug, Clone)]
pub struct BetfairClientConfig {
  /// Betting API base URL.
  pub base_url: String,
  /// `X-Application` header value.
  pub app_key: String,
  /// `X-Authentication` header value.
  pub session_token: String,
  /// Request timeout.
  pub timeout: Duration,
  /// Requests per second ceiling.
  pub max_requests_per_sec: u32,
}

impl From<&BetfairConfig> for BetfairClientConfig {
  fn from(c: &BetfairConfig) -> Self {
    Self {
      base_url: c.betting_url.trim_end_matches('/').to_string(),
      app_key: c.app_key.clone(),
      session_token: c.session_token.clone(),
      timeout: Duration::from_secs(c.timeout_secs),
      max_requests_per_sec: c.max_requests_per_sec,
    }
  }
}

/// Rate-limited HTTP client for the exchange betting API.
pub struct BetfairClient {
  http: Client,
  config: BetfairClientConfig,
  limiter: DirectLimiter,
}

impl BetfairClient {
  /// Create a new exchange client.
  pub fn new(config: BetfairClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    let per_sec = NonZeroU32::new(config.max_requests_per_sec).unwrap_or(NonZeroU32::MIN);
    let limiter = RateLimiter::direct(Quota::per_second(per_sec));

    Ok(Self {
      http,
      config,
      limiter,
    })
  }

  fn url(&self, operation: &str) -> String {
    format!("{}{}", self.config.base_url, operation)
  }

  /// POST a JSON body with auth headers after waiting on the rate limiter.
  ///
  /// Any non-200 status is an error carrying the response body.
  async fn post_json<B: serde::Serialize + Sync>(
    &self,
    operation: &str,
    body: &B,
  ) -> Result<reqwest::Response> {
    let url = self.url(operation);
    self.limiter.until_ready().await;

    let response = self
      .http
      .post(&url)
      .header("X-Application", &self.config.app_key)
      .header("X-Authentication", &self.config.session_token)
      .header("Accept", "application/json")
      .json(body)
      .send()
      .await
      .with_context(|| format!("POST {url} failed"))?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      warn!(status = %status, operation, "Exchange API rejected request");
      anyhow::bail!("API error {status}: {text}");
    }
    Ok(response)
  }
}

#[async_trait]
impl MarketDataApi for BetfairClient {
  #[instrument(skip(self, market_ids), fields(markets = market_ids.len()))]
  async fn list_market_book(&self, market_ids: &[MarketId]) -> Result<Vec<MarketBook>> {
    anyhow::ensure!(
      market_ids.len() <= MARKET_BOOK_BATCH_LIMIT,
      "listMarketBook accepts at most {MARKET_BOOK_BATCH_LIMIT} markets, got {}",
      market_ids.len()
    );
    if market_ids.is_empty() {
      return Ok(Vec::new());
    }

    let request = ListMarketBookRequest::best_offers(market_ids);
    let response = self
      .post_json(LIST_MARKET_BOOK, &request)
      .await
      .context("listMarketBook request failed")?;

    let books: Vec<MarketBookResponse> = response
      .json()
      .await
      .context("Failed to parse listMarketBook response")?;

    for book in books.iter().filter(|b| b.status.as_deref().is_some_and(|s| s != "OPEN")) {
      debug!(
        market_id = %book.market_id,
        status = book.status.as_deref().unwrap_or_default(),
        "Market not open"
      );
    }
    debug!(returned = books.len(), "Market books fetched");
    Ok(books.into_iter().map(MarketBook::from).collect())
  }
}
