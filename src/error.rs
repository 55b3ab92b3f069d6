//! Engine Error Taxonomy
//!
//! Separates failures the sync loop absorbs (transport hiccups, malformed
//! feed messages) from failures that must stop the process (a bootstrap
//! that produced nothing, an under-filled runner on the price path, any
//! persistence write). The top-level driver inspects `is_fatal` and decides
//! whether to exit.

use thiserror::Error;

use crate::domain::game::{GameId, GameMarketId, RunnerId};

/// Errors surfaced by the sync engine and feed supervisor.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Feed, market-data API or event fetch failure.
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),

    /// A feed message that is not a game object or an array of them.
    #[error("malformed feed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Bootstrap finished but the store still knows no markets for the game.
    #[error("bootstrap for game {game} left no markets in the store")]
    EmptyBootstrap { game: GameId },

    /// A runner without a full 3x3 book reached the price-write path.
    #[error(
        "runner {runner} in market {market} is not fully priced \
         (back levels = {back}, lay levels = {lay})"
    )]
    UnpricedRunner {
        market: GameMarketId,
        runner: RunnerId,
        back: usize,
        lay: usize,
    },

    /// Any store read or write failure.
    #[error("persistence failure while {context}: {cause:#}")]
    Persistence {
        context: String,
        cause: anyhow::Error,
    },
}

impl SyncError {
    /// Whether the process must stop.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmptyBootstrap { .. } | Self::UnpricedRunner { .. } | Self::Persistence { .. }
        )
    }

    pub(crate) fn persistence(context: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::Persistence {
            context: context.into(),
            cause,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
