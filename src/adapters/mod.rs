//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, WebSockets, Postgres). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `api`: Exchange market-book client and event metadata fetcher
//! - `feeds`: Live-games WebSocket transport
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: Postgres and in-memory market stores

pub mod api;
pub mod feeds;
pub mod metrics;
pub mod persistence;
