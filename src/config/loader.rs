//! Configuration Loader - File Loading, Environment Overrides, Validation
//!
//! Order of precedence: built-in defaults, then `config.toml`, then the
//! environment. Secrets are expected to come from the environment only.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::domain::MARKET_BOOK_BATCH_LIMIT;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SYNC_CONFIG";

const ENV_APP_KEY: &str = "BETFAIR_APP_KEY";
const ENV_SESSION_TOKEN: &str = "BETFAIR_SESSION_TOKEN";
const ENV_DATABASE_URL: &str = "BETFAIRS_DB_CONN_STR";
const ENV_FEED_URL: &str = "LIVE_FEED_URL";

/// Load, override and validate configuration.
///
/// A missing file is not an error: defaults plus environment are used.
///
/// # Errors
/// Returns detailed error if:
/// - The file exists but can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let mut config = if path.exists() {
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)?
  } else {
    AppConfig::default()
  };

  apply_env_overrides(&mut config, |key| std::env::var(key).ok());
  validate_config(&config)?;

  info!(
    config = %path.display(),
    feed = %config.feed.url,
    backend = %config.persistence.backend,
    batch_size = config.sync.batch_size,
    reconcile_secs = config.sync.reconcile_interval_secs,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse TOML text into a config, without overrides or validation.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).context("Failed to parse config.toml")
}

/// Apply environment overrides through `lookup`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
  F: Fn(&str) -> Option<String>,
{
  let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

  if let Some(v) = get(ENV_APP_KEY) {
    config.betfair.app_key = v;
  }
  if let Some(v) = get(ENV_SESSION_TOKEN) {
    config.betfair.session_token = v;
  }
  if let Some(v) = get(ENV_DATABASE_URL) {
    config.persistence.database_url = v;
  }
  if let Some(v) = get(ENV_FEED_URL) {
    config.feed.url = v;
  }
}

/// Validate all configuration parameters.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  // Feed
  anyhow::ensure!(!config.feed.url.is_empty(), "Feed URL must not be empty");
  anyhow::ensure!(
    config.feed.url.starts_with("ws://") || config.feed.url.starts_with("wss://"),
    "Feed URL must be ws:// or wss://, got {}",
    config.feed.url
  );
  anyhow::ensure!(
    config.feed.handshake_timeout_secs > 0,
    "feed.handshake_timeout_secs must be positive"
  );

  // Exchange API
  anyhow::ensure!(
    !config.betfair.betting_url.is_empty(),
    "Betting API URL must not be empty"
  );
  anyhow::ensure!(
    !config.betfair.app_key.is_empty(),
    "Betfair app key missing (set {ENV_APP_KEY})"
  );
  anyhow::ensure!(
    !config.betfair.session_token.is_empty(),
    "Betfair session token missing (set {ENV_SESSION_TOKEN})"
  );
  anyhow::ensure!(
    config.betfair.max_requests_per_sec > 0,
    "betfair.max_requests_per_sec must be positive"
  );
  anyhow::ensure!(
    config.betfair.timeout_secs > 0,
    "betfair.timeout_secs must be positive"
  );

  anyhow::ensure!(!config.events.url.is_empty(), "Events URL must not be empty");

  // Sync
  anyhow::ensure!(
    (1..=MARKET_BOOK_BATCH_LIMIT).contains(&config.sync.batch_size),
    "sync.batch_size must be in [1, {MARKET_BOOK_BATCH_LIMIT}], got {}",
    config.sync.batch_size
  );
  anyhow::ensure!(
    config.sync.reconcile_interval_secs > 0,
    "sync.reconcile_interval_secs must be positive"
  );
  anyhow::ensure!(
    config.sync.live_ttl_secs > 0,
    "sync.live_ttl_secs must be positive"
  );

  // Persistence
  match config.persistence.backend.as_str() {
    "postgres" => anyhow::ensure!(
      !config.persistence.database_url.is_empty(),
      "Database URL missing (set {ENV_DATABASE_URL})"
    ),
    "memory" => {}
    other => anyhow::bail!("Unknown persistence backend {other:?} (expected postgres or memory)"),
  }
  anyhow::ensure!(
    config.persistence.max_connections > 0,
    "persistence.max_connections must be positive"
  );

  anyhow::ensure!(
    matches!(config.service.log_format.as_str(), "json" | "pretty"),
    "service.log_format must be json or pretty, got {}",
    config.service.log_format
  );

  Ok(())
}
