//! Game and market identity types.
//!
//! A live game is keyed by `(event_id, open_date)`: the feed and the
//! exchange both reuse event ids across seasons, so the open date is part
//! of the natural key. Market ids travel as `"1.<n>"` strings on the wire
//! and as plain integers in the store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Exchange prefix carried by every external market id.
const MARKET_ID_PREFIX: &str = "1.";

/// Natural key of a live game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameId {
    pub event_id: i64,
    pub open_date: DateTime<Utc>,
}

impl GameId {
    pub const fn new(event_id: i64, open_date: DateTime<Utc>) -> Self {
        Self {
            event_id,
            open_date,
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.event_id, self.open_date.to_rfc3339())
    }
}

/// One feed observation of a game in play.
///
/// Never stored as-is; its minute and score stamp the price rows written
/// while processing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameLive {
    pub id: i64,
    pub open_date: DateTime<Utc>,
    #[serde(default)]
    pub minute: i32,
    #[serde(default)]
    pub score_home: i32,
    #[serde(default)]
    pub score_away: i32,
}

impl GameLive {
    pub const fn game_id(&self) -> GameId {
        GameId::new(self.id, self.open_date)
    }
}

/// Exchange market id. Integer internally, `"1.<n>"` externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarketId(pub i64);

impl MarketId {
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for MarketId {
    fn from(n: i64) -> Self {
        Self(n)
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{MARKET_ID_PREFIX}{}", self.0)
    }
}

/// Failure to parse an external market id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid market id {0:?}: expected \"1.<integer>\"")]
pub struct ParseMarketIdError(pub String);

impl FromStr for MarketId {
    type Err = ParseMarketIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(MARKET_ID_PREFIX)
            .and_then(|n| n.parse::<i64>().ok())
            .map(Self)
            .ok_or_else(|| ParseMarketIdError(s.to_string()))
    }
}

impl Serialize for MarketId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MarketId {
    /// Accepts `"1.123"` or a bare integer `123`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Self(n)),
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// One market within one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameMarketId {
    pub game: GameId,
    pub market_id: i64,
}

impl GameMarketId {
    pub const fn new(game: GameId, market_id: i64) -> Self {
        Self { game, market_id }
    }
}

impl fmt::Display for GameMarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.game, MarketId(self.market_id))
    }
}

/// Exchange selection id, passed through untouched.
pub type RunnerId = i64;
