//! Event Metadata Adapter - HTTP Event Lookup
//!
//! Fetches `{base}/{event_id}` and decodes it into `EventDetails`.
//! Implements the `EventSource` port.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::EventsConfig;
use crate::domain::EventDetails;
use crate::ports::EventSource;

/// HTTP-backed event metadata source.
pub struct HttpEventSource {
  http: Client,
  base_url: String,
}

impl HttpEventSource {
  /// Create a new event source.
  pub fn new(config: &EventsConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .context("Failed to build HTTP client")?;

    Ok(Self {
      http,
      base_url: config.url.trim_end_matches('/').to_string(),
    })
  }

  fn event_url(&self, event_id: i64) -> String {
    format!("{}/{event_id}", self.base_url)
  }
}

#[async_trait]
impl EventSource for HttpEventSource {
  #[instrument(skip(self))]
  async fn fetch_event(&self, event_id: i64) -> Result<EventDetails> {
    let url = self.event_url(event_id);
    let response = self
      .http
      .get(&url)
      .send()
      .await
      .with_context(|| format!("GET {url} failed"))?
      .error_for_status()
      .with_context(|| format!("GET {url} returned an error status"))?;

    let body = response.text().await.context("Failed to read event body")?;
    let event: EventDetails =
      serde_json::from_str(&body).with_context(|| format!("Malformed event {event_id}"))?;

    debug!(
      event_id,
      markets = event.markets.len(),
      home = %event.home,
      away = %event.away,
      "Event metadata fetched"
    );
    Ok(event)
  }
}
