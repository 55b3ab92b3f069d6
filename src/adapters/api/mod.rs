//! Exchange and Event HTTP Adapters
//!
//! Implements the HTTP side of the sync engine: batched market-book reads
//! against the exchange betting API and event-metadata lookups used to
//! bootstrap new games.
//!
//! Sub-modules:
//! - `client`: Rate-limited `listMarketBook` client (`MarketDataApi`)
//! - `events`: Event metadata fetcher (`EventSource`)
//! - `types`: API request/response type definitions

pub mod client;
pub mod events;
pub mod types;

pub use client::{BetfairClient, BetfairClientConfig};
pub use events::HttpEventSource;
