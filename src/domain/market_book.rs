//! Market books and the price classifier.
//!
//! The exchange publishes a three-level best-offers book per side. A
//! runner is "priced" only when both sides carry the full depth; anything
//! thinner (book still forming, market suspended) is written as a status
//! change, never as a price row.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::game::{GameLive, GameMarketId, MarketId, RunnerId};
use crate::error::SyncError;

/// Standard best-offers depth per side.
pub const ORDER_BOOK_DEPTH: usize = 3;

/// Runner status as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunnerStatus {
    Active,
    Winner,
    Loser,
    Placed,
    RemovedVacant,
    Removed,
    Hidden,
    /// A status string this build does not know; stored verbatim.
    Unknown(String),
}

impl RunnerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "ACTIVE",
            Self::Winner => "WINNER",
            Self::Loser => "LOSER",
            Self::Placed => "PLACED",
            Self::RemovedVacant => "REMOVED_VACANT",
            Self::Removed => "REMOVED",
            Self::Hidden => "HIDDEN",
            Self::Unknown(s) => s,
        }
    }

    /// Statuses after which the runner's market no longer trades.
    pub const fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Winner | Self::Loser | Self::Placed | Self::RemovedVacant | Self::Removed
        )
    }
}

impl From<&str> for RunnerStatus {
    fn from(s: &str) -> Self {
        match s {
            "ACTIVE" => Self::Active,
            "WINNER" => Self::Winner,
            "LOSER" => Self::Loser,
            "PLACED" => Self::Placed,
            "REMOVED_VACANT" => Self::RemovedVacant,
            "REMOVED" => Self::Removed,
            "HIDDEN" => Self::Hidden,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RunnerStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RunnerStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// One order-book level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSize {
    pub price: f64,
    pub size: f64,
}

impl PriceSize {
    pub const fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

/// A runner as returned by a market-book read.
#[derive(Debug, Clone, PartialEq)]
pub struct Runner {
    pub id: RunnerId,
    pub status: RunnerStatus,
    pub last_price_traded: Option<f64>,
    /// Best back offers, best first.
    pub available_to_back: Vec<PriceSize>,
    /// Best lay offers, best first.
    pub available_to_lay: Vec<PriceSize>,
}

/// A polled market book.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketBook {
    pub market_id: MarketId,
    pub total_matched: f64,
    pub total_available: f64,
    pub runners: Vec<Runner>,
}

/// True iff both sides carry exactly `ORDER_BOOK_DEPTH` levels.
pub fn is_priced(runner: &Runner) -> bool {
    runner.available_to_back.len() == ORDER_BOOK_DEPTH
        && runner.available_to_lay.len() == ORDER_BOOK_DEPTH
}

/// A complete price observation for one runner, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerPriceSnapshot {
    pub market: GameMarketId,
    pub runner_id: RunnerId,
    pub status: RunnerStatus,
    pub minute: i32,
    pub score_home: i32,
    pub score_away: i32,
    pub back: [PriceSize; ORDER_BOOK_DEPTH],
    pub lay: [PriceSize; ORDER_BOOK_DEPTH],
    pub total_matched: f64,
    pub total_available: f64,
    pub last_price_traded: Option<f64>,
}

impl RunnerPriceSnapshot {
    /// Builds a price row from a polled book.
    ///
    /// # Errors
    /// `SyncError::UnpricedRunner` when either side is not exactly
    /// `ORDER_BOOK_DEPTH` deep. Callers must classify with `is_priced`
    /// first; reaching this error means that check was skipped.
    pub fn from_book(
        game: &GameLive,
        book: &MarketBook,
        runner: &Runner,
    ) -> Result<Self, SyncError> {
        let market = GameMarketId::new(game.game_id(), book.market_id.as_i64());
        let unpriced = || SyncError::UnpricedRunner {
            market,
            runner: runner.id,
            back: runner.available_to_back.len(),
            lay: runner.available_to_lay.len(),
        };
        let back: [PriceSize; ORDER_BOOK_DEPTH] = runner
            .available_to_back
            .as_slice()
            .try_into()
            .map_err(|_| unpriced())?;
        let lay: [PriceSize; ORDER_BOOK_DEPTH] = runner
            .available_to_lay
            .as_slice()
            .try_into()
            .map_err(|_| unpriced())?;

        Ok(Self {
            market,
            runner_id: runner.id,
            status: runner.status.clone(),
            minute: game.minute,
            score_home: game.score_home,
            score_away: game.score_away,
            back,
            lay,
            total_matched: book.total_matched,
            total_available: book.total_available,
            last_price_traded: runner.last_price_traded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn levels(n: usize) -> Vec<PriceSize> {
        (0..n)
            .map(|i| PriceSize::new(2.0 + i as f64 * 0.02, 10.0))
            .collect()
    }

    fn runner(back: usize, lay: usize) -> Runner {
        Runner {
            id: 47_972,
            status: RunnerStatus::Active,
            last_price_traded: Some(2.04),
            available_to_back: levels(back),
            available_to_lay: levels(lay),
        }
    }

    fn game() -> GameLive {
        GameLive {
            id: 100,
            open_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            minute: 10,
            score_home: 0,
            score_away: 1,
        }
    }

    fn book(r: Runner) -> MarketBook {
        MarketBook {
            market_id: MarketId(555),
            total_matched: 1000.0,
            total_available: 250.0,
            runners: vec![r],
        }
    }

    #[test]
    fn full_depth_is_priced() {
        assert!(is_priced(&runner(3, 3)));
    }

    #[test]
    fn partial_or_excess_depth_is_not_priced() {
        assert!(!is_priced(&runner(2, 3)));
        assert!(!is_priced(&runner(3, 0)));
        assert!(!is_priced(&runner(4, 3)));
        assert!(!is_priced(&runner(0, 0)));
    }

    #[test]
    fn snapshot_carries_game_stamp_and_totals() {
        let r = runner(3, 3);
        let b = book(r.clone());
        let snap = RunnerPriceSnapshot::from_book(&game(), &b, &r).unwrap();
        assert_eq!(snap.market.market_id, 555);
        assert_eq!(snap.market.game.event_id, 100);
        assert_eq!(snap.minute, 10);
        assert_eq!(snap.score_away, 1);
        assert_eq!(snap.back[0].price, 2.0);
        assert_eq!(snap.total_available, 250.0);
        assert_eq!(snap.last_price_traded, Some(2.04));
    }

    #[test]
    fn snapshot_refuses_thin_book() {
        let r = runner(2, 3);
        let b = book(r.clone());
        let err = RunnerPriceSnapshot::from_book(&game(), &b, &r).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            SyncError::UnpricedRunner { back: 2, lay: 3, .. }
        ));
    }

    #[test]
    fn status_strings_round_trip() {
        for s in ["ACTIVE", "WINNER", "LOSER", "REMOVED", "SUSPENDED_SOMETHING"] {
            assert_eq!(RunnerStatus::from(s).as_str(), s);
        }
        assert!(RunnerStatus::Winner.is_settled());
        assert!(!RunnerStatus::Active.is_settled());
        assert!(!RunnerStatus::Hidden.is_settled());
    }
}
