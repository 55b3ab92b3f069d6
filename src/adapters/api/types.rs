//! Exchange API Request/Response Types
//!
//! Serialization types for `listMarketBook`. Only the fields the sync
//! engine reads are modelled; everything else in the response is ignored.
//! Wire types convert into `domain::MarketBook` through `From`.

use serde::{Deserialize, Serialize};

use crate::domain::{MarketBook, MarketId, PriceSize, Runner, RunnerStatus};

/// Price data requested on every book read.
pub const EX_BEST_OFFERS: &str = "EX_BEST_OFFERS";

/// `listMarketBook` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMarketBookRequest {
  /// Markets to read (at most 40).
  pub market_ids: Vec<MarketId>,
  /// Which price ladders to include.
  pub price_projection: PriceProjection,
}

impl ListMarketBookRequest {
  /// Best-offers request for the given markets.
  pub fn best_offers(market_ids: &[MarketId]) -> Self {
    Self {
      market_ids: market_ids.to_vec(),
      price_projection: PriceProjection {
        price_data: vec![EX_BEST_OFFERS.to_string()],
      },
    }
  }
}

/// Price projection selector.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceProjection {
  pub price_data: Vec<String>,
}

/// One market book from the response array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketBookResponse {
  /// External `"1.<n>"` id.
  pub market_id: MarketId,
  /// Amount matched on the market so far.
  #[serde(default)]
  pub total_matched: f64,
  /// Amount currently offered.
  #[serde(default)]
  pub total_available: f64,
  /// Market status (OPEN, SUSPENDED, CLOSED). Only logged, when not OPEN.
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub runners: Vec<RunnerResponse>,
}

/// One runner inside a market book.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerResponse {
  pub selection_id: i64,
  pub status: RunnerStatus,
  #[serde(default)]
  pub last_price_traded: Option<f64>,
  /// Absent when the market is closed.
  #[serde(default)]
  pub ex: Option<ExchangePrices>,
}

/// Best-offers ladders.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePrices {
  #[serde(default)]
  pub available_to_back: Vec<PriceSize>,
  #[serde(default)]
  pub available_to_lay: Vec<PriceSize>,
}

impl From<RunnerResponse> for Runner {
  fn from(r: RunnerResponse) -> Self {
    let ex = r.ex.unwrap_or_default();
    Self {
      id: r.selection_id,
      status: r.status,
      last_price_traded: r.last_price_traded,
      available_to_back: ex.available_to_back,
      available_to_lay: ex.available_to_lay,
    }
  }
}

impl From<MarketBookResponse> for MarketBook {
  fn from(m: MarketBookResponse) -> Self {
    Self {
      market_id: m.market_id,
      total_matched: m.total_matched,
      total_available: m.total_available,
      runners: m.runners.into_iter().map(Runner::from).collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_serializes_external_ids() {
    let req = ListMarketBookRequest::best_offers(&[MarketId(1), MarketId(22)]);
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["marketIds"], serde_json::json!(["1.1", "1.22"]));
    assert_eq!(
      json["priceProjection"]["priceData"],
      serde_json::json!(["EX_BEST_OFFERS"])
    );
  }

  #[test]
  fn response_converts_to_domain_book() {
    let raw = r#"[{
      "marketId": "1.555",
      "isMarketDataDelayed": false,
      "status": "OPEN",
      "totalMatched": 1234.5,
      "totalAvailable": 99.0,
      "runners": [
        {"selectionId": 1, "status": "ACTIVE", "lastPriceTraded": 2.0,
         "ex": {"availableToBack": [{"price": 1.99, "size": 10.0}],
                "availableToLay": [{"price": 2.02, "size": 5.0}],
                "tradedVolume": []}},
        {"selectionId": 2, "status": "LOSER"}
      ]
    }]"#;
    let books: Vec<MarketBookResponse> = serde_json::from_str(raw).unwrap();
    let book = MarketBook::from(books.into_iter().next().unwrap());
    assert_eq!(book.market_id, MarketId(555));
    assert_eq!(book.total_matched, 1234.5);
    assert_eq!(book.runners[0].available_to_back.len(), 1);
    assert_eq!(book.runners[1].status, RunnerStatus::Loser);
    assert!(book.runners[1].available_to_lay.is_empty());
    assert_eq!(book.runners[1].last_price_traded, None);
  }
}
