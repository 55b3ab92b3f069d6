//! Live set and feed message decoding.
//!
//! The feed pushes either a single game object or an array of them. An
//! array is the full list of games in play and replaces the live set; a
//! single object only refreshes that game. Entries that stop being
//! refreshed age out after a TTL so a game the feed silently dropped is
//! eventually reconciled.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use serde::Deserialize;

use super::game::{GameId, GameLive};

/// One decoded feed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedBatch {
    pub games: Vec<GameLive>,
    /// True when the message was an array (a complete live set).
    pub complete: bool,
}

/// Decodes a feed text frame into a `FeedBatch`.
///
/// # Errors
/// Returns the JSON error when the frame is neither a game object nor an
/// array of game objects.
pub fn decode_message(text: &str) -> Result<FeedBatch, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        Many(Vec<GameLive>),
        One(GameLive),
    }

    Ok(match serde_json::from_str::<Payload>(text)? {
        Payload::Many(games) => FeedBatch {
            games,
            complete: true,
        },
        Payload::One(game) => FeedBatch {
            games: vec![game],
            complete: false,
        },
    })
}

/// Games currently considered in play, with last-seen times.
#[derive(Debug, Clone)]
pub struct LiveSet {
    seen: BTreeMap<GameId, Instant>,
    ttl: Duration,
}

impl LiveSet {
    pub const fn new(ttl: Duration) -> Self {
        Self {
            seen: BTreeMap::new(),
            ttl,
        }
    }

    /// Folds a feed batch in, observed at `now`.
    pub fn apply(&mut self, batch: &FeedBatch, now: Instant) {
        if batch.complete {
            self.seen.clear();
        }
        for game in &batch.games {
            self.seen.insert(game.game_id(), now);
        }
    }

    /// Drops entries not refreshed within the TTL and returns the rest.
    pub fn current(&mut self, now: Instant) -> BTreeSet<GameId> {
        let ttl = self.ttl;
        self.seen
            .retain(|_, seen| now.saturating_duration_since(*seen) <= ttl);
        self.seen.keys().copied().collect()
    }

    pub fn contains(&self, game: &GameId) -> bool {
        self.seen.contains_key(game)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
