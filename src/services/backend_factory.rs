//! Backend factory for service initialization.
//!
//! Centralizes backend creation so the binary and tests wire services the
//! same way.
//!
//! # Architecture
//!
//! ```text
//! BackendFactory
//!   ├── create_record_store() → Arc<dyn RecordStore>
//!   ├── create_search_backend() → Arc<dyn SearchBackend>
//!   └── create_services() → ServiceSet { catalog, sync }
//! ```
//!
//! The search backend is always wrapped in [`ResilientSearchBackend`]. Creating
//! it never contacts the server, so an unreachable index does not stop startup.

use crate::config::{RapidstockConfig, SearchBackendKind, SearchConfig};
use crate::services::{CatalogService, IndexSyncService};
use crate::storage::{
    InMemorySearchBackend, MeilisearchBackend, MeilisearchTimeouts, RecordStore,
    ResilientSearchBackend, SearchBackend, SqliteRecordStore,
};
use crate::Result;
use std::sync::Arc;

/// Fully wired services.
pub struct ServiceSet {
    /// Write path.
    pub catalog: CatalogService,
    /// Index synchronization, shared with `catalog`.
    pub sync: Arc<IndexSyncService>,
}

/// Factory for creating backends and services.
pub struct BackendFactory;

impl BackendFactory {
    /// Opens the `SQLite` record store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn create_record_store(config: &RapidstockConfig) -> Result<Arc<dyn RecordStore>> {
        let store = SqliteRecordStore::new(&config.database_path)?;
        tracing::debug!(path = %config.database_path.display(), "Opened SQLite record store");
        Ok(Arc::new(store))
    }

    /// Creates the configured search backend behind a circuit breaker.
    #[must_use]
    pub fn create_search_backend(config: &SearchConfig) -> Arc<dyn SearchBackend> {
        match config.backend {
            SearchBackendKind::Meilisearch => {
                let timeouts = MeilisearchTimeouts {
                    request_timeout_ms: config.timeout_ms,
                    connect_timeout_ms: config.connect_timeout_ms,
                    task_timeout_ms: config.task_timeout_ms,
                    ..MeilisearchTimeouts::default()
                };
                let backend = MeilisearchBackend::new(&config.url, config.api_key.clone(), timeouts);
                tracing::debug!(url = %config.url, authenticated = config.api_key.is_some(), "Created Meilisearch backend");
                Arc::new(ResilientSearchBackend::new(backend, &config.breaker))
            },
            SearchBackendKind::Memory => {
                tracing::debug!("Created in-memory search backend");
                Arc::new(ResilientSearchBackend::new(
                    InMemorySearchBackend::new(),
                    &config.breaker,
                ))
            },
        }
    }

    /// Wires the sync and catalog services over the given backends.
    #[must_use]
    pub fn create_services_with(
        records: Arc<dyn RecordStore>,
        index: Arc<dyn SearchBackend>,
        config: &SearchConfig,
    ) -> ServiceSet {
        let sync = Arc::new(IndexSyncService::new(
            Arc::clone(&records),
            index,
            config.collections.clone(),
        ));
        ServiceSet {
            catalog: CatalogService::new(records, Arc::clone(&sync)),
            sync,
        }
    }

    /// Creates every backend and service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store cannot be opened.
    pub fn create_services(config: &RapidstockConfig) -> Result<ServiceSet> {
        let records = Self::create_record_store(config)?;
        let index = Self::create_search_backend(&config.search);
        Ok(Self::create_services_with(records, index, &config.search))
    }
}
