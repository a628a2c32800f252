//! # Rapidstock
//!
//! Product catalog backend: products, categories, and attributes kept in a
//! relational system of record, mirrored into a search index.
//!
//! ## Architecture
//!
//! ```text
//!             CatalogService
//!            /              \
//!   RecordStore           IndexSyncService
//!   (SQLite, authoritative)    |
//!                         SearchBackend
//!                         (Meilisearch / in-memory)
//! ```
//!
//! - **System of record**: [`storage::SqliteRecordStore`] owns every write and
//!   enforces referential integrity.
//! - **Search index**: a derived, eventually consistent projection. It is rebuilt
//!   in full at startup and patched after every committed mutation.
//! - **Fault isolation**: index faults after startup are logged and discarded;
//!   they never fail a write that the system of record already committed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rapidstock::services::{CatalogService, IndexSyncService};
//! use rapidstock::models::{NewCategory, NewProduct};
//!
//! let sync = Arc::new(IndexSyncService::new(records.clone(), index, collections));
//! sync.startup_resync()?;
//!
//! let catalog = CatalogService::new(records, sync);
//! let category = catalog.create_category(&NewCategory::new("Tools"))?;
//! catalog.create_product(&NewProduct::new("Hammer", category.id))?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{RapidstockConfig, SearchBackendKind, SearchConfig};
pub use models::{
    Attribute, Category, Document, EntityKind, NewAttribute, NewCategory, NewProduct, Product,
};
pub use services::{CatalogService, HealthReport, IndexSyncService, ResyncReport};
pub use storage::{IndexError, IndexResult, RecordStore, SearchBackend};

/// Error type for rapidstock operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty names, malformed `name=value` pairs, unknown entity kinds |
/// | `NotFound` | A product, category, or attribute id does not exist |
/// | `Conflict` | Referential integrity rejects a write (missing category, referenced category) |
/// | `OperationFailed` | `SQLite` errors, configuration I/O, logging setup |
/// | `SearchUnavailable` | Collection bootstrap cannot reach the index backend |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested row does not exist in the system of record.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind that was looked up.
        kind: EntityKind,
        /// Identifier that was looked up.
        id: i64,
    },

    /// The system of record rejected the write.
    ///
    /// Raised when:
    /// - A product references a category that does not exist
    /// - A category is deleted while products still reference it
    /// - An attribute references a product that does not exist
    #[error("conflict: {0}")]
    Conflict(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The search index could not be bootstrapped.
    ///
    /// Only returned by [`IndexSyncService::startup_resync`]; the host process
    /// keeps running with search marked degraded.
    #[error("search unavailable: {0}")]
    SearchUnavailable(String),
}

impl From<IndexError> for Error {
    fn from(err: IndexError) -> Self {
        Self::OperationFailed {
            operation: "search_index".to_string(),
            cause: err.to_string(),
        }
    }
}

/// Result type alias for rapidstock operations.
pub type Result<T> = std::result::Result<T, Error>;
