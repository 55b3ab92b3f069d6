//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`, then applies
//! environment overrides for secrets and per-deployment endpoints.
//! Every section has defaults, so an empty file is a valid config once the
//! credentials arrive through the environment.

pub mod loader;

use serde::Deserialize;

use crate::domain::{DEFAULT_EXCLUDED_MARKETS, MARKET_BOOK_BATCH_LIMIT};

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Live-game feed transport.
  pub feed: FeedConfig,
  /// Exchange market-data API.
  pub betfair: BetfairConfig,
  /// Event-metadata endpoint.
  pub events: EventsConfig,
  /// Sync engine tuning.
  pub sync: SyncConfig,
  /// Relational store.
  pub persistence: PersistenceConfig,
  /// Metrics and health endpoints.
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
  /// Human-readable service name, attached to the startup log.
  pub name: String,
  /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
  pub log_level: String,
  /// `json` or `pretty`.
  pub log_format: String,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: "betfair-live-sync".to_string(),
      log_level: default_log_level(),
      log_format: "json".to_string(),
    }
  }
}

/// Live feed configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
  /// WebSocket URL of the live-games stream.
  pub url: String,
  /// Bound on the WebSocket handshake (seconds).
  pub handshake_timeout_secs: u64,
  /// Fixed wait between failed dials (seconds).
  pub dial_retry_secs: u64,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      url: "wss://betfairs.herokuapp.com/football/live".to_string(),
      handshake_timeout_secs: 300,
      dial_retry_secs: 5,
    }
  }
}

/// Exchange API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BetfairConfig {
  /// Betting API base URL, without the operation suffix.
  pub betting_url: String,
  /// Application key sent as `X-Application`.
  pub app_key: String,
  /// Session token sent as `X-Authentication`.
  pub session_token: String,
  /// Request timeout in seconds.
  pub timeout_secs: u64,
  /// Client-side request rate cap.
  pub max_requests_per_sec: u32,
}

impl Default for BetfairConfig {
  fn default() -> Self {
    Self {
      betting_url: "https://api.betfair.com/exchange/betting/rest/v1.0".to_string(),
      app_key: String::new(),
      session_token: String::new(),
      timeout_secs: default_timeout(),
      max_requests_per_sec: 5,
    }
  }
}

/// Event-metadata endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
  /// Base URL; the event id is appended as a path segment.
  pub url: String,
  /// Request timeout in seconds.
  pub timeout_secs: u64,
}

impl Default for EventsConfig {
  fn default() -> Self {
    Self {
      url: "https://betfairs.herokuapp.com/event".to_string(),
      timeout_secs: default_timeout(),
    }
  }
}

/// Sync engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Market ids per `listMarketBook` call. Must not exceed the API limit.
  pub batch_size: usize,
  /// Interval between reconciliation passes (seconds).
  pub reconcile_interval_secs: u64,
  /// How long a game stays live without being refreshed by the feed.
  pub live_ttl_secs: u64,
  /// Market names never tracked (case-insensitive).
  pub excluded_market_names: Vec<String>,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      batch_size: MARKET_BOOK_BATCH_LIMIT,
      reconcile_interval_secs: 300,
      live_ttl_secs: 600,
      excluded_market_names: DEFAULT_EXCLUDED_MARKETS
        .iter()
        .map(ToString::to_string)
        .collect(),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
  /// `postgres` or `memory`.
  pub backend: String,
  /// Postgres connection string.
  pub database_url: String,
  /// Pool size.
  pub max_connections: u32,
  /// Pool acquire timeout (seconds).
  pub acquire_timeout_secs: u64,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      backend: "postgres".to_string(),
      database_url: String::new(),
      max_connections: 5,
      acquire_timeout_secs: 10,
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  pub enabled: bool,
  /// Metrics server bind address.
  pub bind_address: String,
  /// Health check endpoint port.
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: "0.0.0.0:9090".to_string(),
      health_port: 8080,
    }
  }
}

// Default value functions shared by several sections

fn default_log_level() -> String {
  "info".to_string()
}

const fn default_timeout() -> u64 {
  30
}
