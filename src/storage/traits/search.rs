//! Search backend trait.
//!
//! The search layer is a derived, independently queryable mirror of the record
//! store. One collection exists per [`EntityKind`](crate::models::EntityKind),
//! keyed by the document primary key.
//!
//! # Error Modes and Guarantees
//!
//! Every method except [`SearchBackend::health`] returns [`IndexResult`].
//! Callers decide what a fault means:
//!
//! | Call site | Policy |
//! |-----------|--------|
//! | Collection bootstrap at startup | escalate, mark search degraded |
//! | Per-mutation propagation | log with kind, ids, operation; discard |
//! | Search queries | return to the caller |
//!
//! # Deadlines
//!
//! Implementations bound every call by their own deadline (HTTP timeout plus
//! task-completion wait for remote backends). A call that outlives it returns
//! [`IndexError::Timeout`], which callers treat exactly like any other fault.
//!
//! # Consistency
//!
//! [`SearchBackend::replace_all_documents`] clears and then inserts. It is not
//! atomic: a concurrent reader can observe an empty collection mid-replace.

use crate::models::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by search backends.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// The backend could not be reached.
    #[error("{operation}: backend unreachable: {cause}")]
    Unreachable {
        /// Gateway operation.
        operation: &'static str,
        /// Transport error.
        cause: String,
    },

    /// The call exceeded its deadline.
    #[error("{operation}: timed out after {timeout_ms}ms")]
    Timeout {
        /// Gateway operation.
        operation: &'static str,
        /// Deadline that elapsed.
        timeout_ms: u64,
    },

    /// The backend answered with an error status.
    #[error("{operation}: rejected with status {status}: {message}")]
    Rejected {
        /// Gateway operation.
        operation: &'static str,
        /// HTTP-like status code.
        status: u16,
        /// Backend error message.
        message: String,
    },

    /// An accepted asynchronous task ended unsuccessfully.
    #[error("{operation}: task {task_uid} ended as {status}")]
    TaskFailed {
        /// Gateway operation.
        operation: &'static str,
        /// Backend task identifier.
        task_uid: u64,
        /// Terminal task status.
        status: String,
    },

    /// The backend response could not be decoded.
    #[error("{operation}: undecodable response: {cause}")]
    Decode {
        /// Gateway operation.
        operation: &'static str,
        /// Decoder error.
        cause: String,
    },

    /// A circuit breaker short-circuited the call.
    #[error("{operation}: circuit breaker open for backend '{backend}'")]
    CircuitOpen {
        /// Gateway operation.
        operation: &'static str,
        /// Wrapped backend name.
        backend: &'static str,
    },
}

impl IndexError {
    /// Returns the gateway operation that failed.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Unreachable { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Rejected { operation, .. }
            | Self::TaskFailed { operation, .. }
            | Self::Decode { operation, .. }
            | Self::CircuitOpen { operation, .. } => *operation,
        }
    }

    /// Returns true if the fault means the backend is not currently reachable.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::CircuitOpen { .. }
        )
    }
}

/// Result type for search backend calls.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Coarse backend health token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendHealth {
    /// Backend reports itself ready.
    Available,
    /// Backend could not be reached.
    Unavailable,
    /// Backend answered with a status it does not document.
    Unknown(String),
}

impl BackendHealth {
    /// Maps a raw backend status string to a health token.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "available" => Self::Available,
            "unavailable" => Self::Unavailable,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the health as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Unknown(status) if status.is_empty() => "unknown",
            Self::Unknown(status) => status.as_str(),
        }
    }

    /// Returns true if the backend reported `available`.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for BackendHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for search index backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn SearchBackend>`
/// - Empty `documents` / `ids` inputs are no-ops that make no backend call
/// - `delete_document` of an absent id succeeds
/// - `health` never fails; unreachability is reported as a value
pub trait SearchBackend: Send + Sync {
    /// Backend name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Creates the collection if absent.
    ///
    /// Returns `true` if the collection was created by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or refuses creation.
    fn ensure_collection_exists(&self, name: &str, primary_key: &str) -> IndexResult<bool>;

    /// Clears the collection, then inserts `documents`.
    ///
    /// The clear happens even when `documents` is empty. Returns the number of
    /// documents inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if either step fails.
    fn replace_all_documents(&self, collection: &str, documents: &[Document])
    -> IndexResult<usize>;

    /// Inserts or replaces documents by primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_documents(&self, collection: &str, documents: &[Document]) -> IndexResult<()>;

    /// Removes documents by primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_documents(&self, collection: &str, ids: &[i64]) -> IndexResult<()>;

    /// Removes one document by primary key, succeeding if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_document(&self, collection: &str, id: i64) -> IndexResult<()> {
        self.delete_documents(collection, &[id])
    }

    /// Returns documents matching `query`, or an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot answer.
    fn search(&self, collection: &str, query: &str) -> IndexResult<Vec<Document>>;

    /// Reports backend health. Never fails.
    fn health(&self) -> BackendHealth;
}
