//! Event metadata used to bootstrap a newly seen game.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::game::{GameId, MarketId, RunnerId};

/// Market names never tracked, compared lower-cased.
pub const DEFAULT_EXCLUDED_MARKETS: &[&str] = &["азиатский гандикап", "asian handicap"];

/// Full event description as served by the event-metadata endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub id: i64,
    pub open_date: DateTime<Utc>,
    #[serde(default)]
    pub competition_id: i64,
    #[serde(default)]
    pub competition_name: String,
    pub home: String,
    pub away: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub markets: Vec<EventMarket>,
}

impl EventDetails {
    pub const fn game_id(&self) -> GameId {
        GameId::new(self.id, self.open_date)
    }

    /// Markets to persist, skipping any whose name is excluded.
    pub fn target_markets<'a, S: AsRef<str>>(
        &'a self,
        excluded: &'a [S],
    ) -> impl Iterator<Item = &'a EventMarket> + 'a {
        self.markets
            .iter()
            .filter(move |m| !m.is_excluded(excluded))
    }
}

/// One market listed under an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMarket {
    pub id: MarketId,
    pub name: String,
    #[serde(default)]
    pub runners: Vec<EventRunner>,
}

impl EventMarket {
    /// Case-insensitive match against the exclusion list.
    pub fn is_excluded<S: AsRef<str>>(&self, excluded: &[S]) -> bool {
        let name = self.name.trim().to_lowercase();
        excluded
            .iter()
            .any(|e| e.as_ref().trim().to_lowercase() == name)
    }
}

/// One runner (selection) of a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRunner {
    pub id: RunnerId,
    pub name: String,
}
