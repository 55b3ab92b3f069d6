//! Live Feed Adapters
//!
//! WebSocket transport for the live-games stream. Reconnect policy lives in
//! `usecases::feed_supervisor`; this layer only dials and reads.

pub mod live_ws;

pub use live_ws::{WsFeedConnection, WsFeedConnector};
