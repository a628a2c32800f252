//! Search backend implementations.
//!
//! Available backends:
//! - [`MeilisearchBackend`]: remote Meilisearch server over HTTP
//! - [`InMemorySearchBackend`]: process-local collections for local runs and tests

mod meilisearch;
mod memory;

pub use meilisearch::{MeilisearchBackend, MeilisearchTimeouts};
pub use memory::InMemorySearchBackend;
