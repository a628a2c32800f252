//! Business logic services.
//!
//! Services orchestrate the record store and the search backend.

mod backend_factory;
mod catalog;
mod index_sync;

pub use backend_factory::{BackendFactory, ServiceSet};
pub use catalog::CatalogService;
pub use index_sync::{
    HealthReport, HealthStatus, IndexSyncService, KindFailure, KindSync, ResyncReport,
};
