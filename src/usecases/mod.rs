//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! service's two workflows.
//!
//! Use cases:
//! - `SyncEngine`: Bootstrap, batch-poll and persist per feed batch; reconcile
//! - `FeedSupervisor`: Reconnecting feed loop and reconciliation timer

pub mod feed_supervisor;
pub mod sync_engine;

pub use feed_supervisor::{FeedSupervisor, SupervisorSettings};
pub use sync_engine::{CycleReport, ReconcileReport, SyncEngine, SyncSettings};
