//! Storage backend traits.

mod records;
mod search;

pub use records::RecordStore;
pub use search::{BackendHealth, IndexError, IndexResult, SearchBackend};
