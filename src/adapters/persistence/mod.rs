//! Persistence Adapters - Market Store Backends
//!
//! Implements the `MarketRepository` port twice: against Postgres stored
//! functions through sqlx, and in memory for local runs and tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;
