//! Storage layer.
//!
//! Two layers with different authority:
//! - **Records**: the authoritative system of record (`SQLite`)
//! - **Search**: a derived, best-effort mirror (Meilisearch or in-memory)

// Dropping connection guards slightly earlier provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod migrations;
pub mod records;
pub mod resilience;
pub mod search;
pub mod sqlite;
pub mod traits;

pub use records::SqliteRecordStore;
pub use resilience::{
    BreakerPosition, CircuitBreaker, ResilientSearchBackend, StorageResilienceConfig,
};
pub use search::{InMemorySearchBackend, MeilisearchBackend, MeilisearchTimeouts};
pub use traits::{BackendHealth, IndexError, IndexResult, RecordStore, SearchBackend};
