//! Index synchronization service.
//!
//! Mediates between the system of record and the search index. Two control
//! paths:
//!
//! - **Startup resync**: ensure every collection exists, then rebuild each one
//!   from the record store in fixed kind order.
//! - **Propagation**: after a mutation commits, push the change to the matching
//!   collection. Faults are logged and discarded.
//!
//! # Fault Policy
//!
//! | Path | Backend fault |
//! |------|---------------|
//! | Collection bootstrap | `Error::SearchUnavailable`, search marked degraded |
//! | Per-kind replace during resync | recorded in [`ResyncReport::failed`], later kinds skipped |
//! | Propagation | logged with kind, ids, and operation via [`IndexSyncService::discard`] |
//! | Search query | returned to the caller |
//!
//! Propagation is attempted even while degraded: a backend that has come back
//! should receive new writes without waiting for the next resync.

use crate::config::CollectionNames;
use crate::models::{
    Attribute, Category, Document, EntityKind, Indexable, PRIMARY_KEY, Product, project_all,
};
use crate::storage::traits::{BackendHealth, IndexResult, RecordStore, SearchBackend};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::instrument;

/// A kind that was fully rebuilt during resync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSync {
    /// Entity kind.
    pub kind: EntityKind,
    /// Documents written.
    pub count: usize,
    /// Time spent loading and replacing.
    pub elapsed: Duration,
}

/// The kind whose rebuild failed during resync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindFailure {
    /// Entity kind.
    pub kind: EntityKind,
    /// Failure description.
    pub error: String,
}

/// Outcome of a resync whose collection bootstrap succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResyncReport {
    /// Kinds whose collection was created by this resync.
    pub created_collections: Vec<EntityKind>,
    /// Kinds rebuilt successfully, in resync order.
    pub synced: Vec<KindSync>,
    /// The kind that failed, if any.
    pub failed: Option<KindFailure>,
    /// Kinds never attempted because an earlier kind failed.
    pub skipped: Vec<EntityKind>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl ResyncReport {
    /// Returns true if every kind was rebuilt.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed.is_none() && self.skipped.is_empty()
    }

    /// Returns the document count for `kind` if it was rebuilt.
    #[must_use]
    pub fn count_for(&self, kind: EntityKind) -> Option<usize> {
        self.synced.iter().find(|s| s.kind == kind).map(|s| s.count)
    }

    /// Total documents written across rebuilt kinds.
    #[must_use]
    pub fn total_documents(&self) -> usize {
        self.synced.iter().map(|s| s.count).sum()
    }
}

/// Overall service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Record store up and search available.
    Healthy,
    /// Record store up, search not available. Writes still succeed.
    Degraded,
}

impl HealthStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
        }
    }
}

/// Composite health of the record store and the search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// System-of-record status; always `ok` while the process is serving.
    pub database: &'static str,
    /// Search backend status.
    pub search: BackendHealth,
    /// True if the last resync did not complete.
    pub resync_required: bool,
}

/// Milliseconds with one decimal, for log fields.
fn millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 10_000.0).round() / 10.0
}

/// Keeps the search index in step with the system of record.
pub struct IndexSyncService {
    records: Arc<dyn RecordStore>,
    index: Arc<dyn SearchBackend>,
    collections: CollectionNames,
    degraded: AtomicBool,
}

impl IndexSyncService {
    /// Creates a sync service over the given stores.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        index: Arc<dyn SearchBackend>,
        collections: CollectionNames,
    ) -> Self {
        Self {
            records,
            index,
            collections,
            degraded: AtomicBool::new(false),
        }
    }

    /// Returns the collection names.
    #[must_use]
    pub const fn collections(&self) -> &CollectionNames {
        &self.collections
    }

    /// Returns true if the last resync did not complete.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn collection(&self, kind: EntityKind) -> &str {
        self.collections.name_for(kind)
    }

    /// Rebuilds the search index from the system of record.
    ///
    /// Collections are bootstrapped first; then products, categories, and
    /// attributes are replaced in that order. A failing kind stops the
    /// sequence: earlier kinds stay freshly synced, later kinds are reported as
    /// skipped. A complete resync clears the degraded flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SearchUnavailable`] if collection bootstrap fails. The
    /// service is then degraded; callers should keep running without search.
    #[instrument(skip(self), fields(operation = "startup_resync"))]
    pub fn startup_resync(&self) -> Result<ResyncReport> {
        let start = Instant::now();

        let created_collections = match self.bootstrap_collections() {
            Ok(created) => created,
            Err((kind, err)) => {
                self.degraded.store(true, Ordering::SeqCst);
                tracing::error!(
                    kind = %kind,
                    collection = self.collection(kind),
                    operation = err.operation(),
                    error = %err,
                    "Search collection bootstrap failed; continuing without search"
                );
                metrics::histogram!("index_resync_duration_ms", "status" => "unavailable")
                    .record(start.elapsed().as_secs_f64() * 1000.0);
                return Err(Error::SearchUnavailable(err.to_string()));
            },
        };

        let mut report = ResyncReport {
            created_collections,
            ..ResyncReport::default()
        };

        for (position, &kind) in EntityKind::all().iter().enumerate() {
            let kind_start = Instant::now();
            match self.resync_kind(kind) {
                Ok(count) => {
                    let elapsed = kind_start.elapsed();
                    tracing::info!(
                        kind = %kind,
                        count,
                        elapsed_ms = millis(elapsed),
                        "Resynced collection"
                    );
                    metrics::counter!("index_resync_documents_total", "kind" => kind.as_str())
                        .increment(count as u64);
                    report.synced.push(KindSync {
                        kind,
                        count,
                        elapsed,
                    });
                },
                Err(err) => {
                    tracing::error!(
                        kind = %kind,
                        error = %err,
                        elapsed_ms = millis(kind_start.elapsed()),
                        "Resync failed; remaining kinds skipped"
                    );
                    report.failed = Some(KindFailure {
                        kind,
                        error: err.to_string(),
                    });
                    report.skipped = EntityKind::all()[position + 1..].to_vec();
                    break;
                },
            }
        }

        report.elapsed = start.elapsed();
        let complete = report.is_complete();
        self.degraded.store(!complete, Ordering::SeqCst);

        let status = if complete { "success" } else { "partial" };
        metrics::histogram!("index_resync_duration_ms", "status" => status)
            .record(report.elapsed.as_secs_f64() * 1000.0);
        tracing::info!(
            complete,
            documents = report.total_documents(),
            elapsed_ms = millis(report.elapsed),
            "Startup resync finished"
        );

        Ok(report)
    }

    fn bootstrap_collections(
        &self,
    ) -> std::result::Result<Vec<EntityKind>, (EntityKind, crate::IndexError)> {
        let mut created = Vec::new();
        for &kind in EntityKind::all() {
            let name = self.collection(kind);
            if self
                .index
                .ensure_collection_exists(name, PRIMARY_KEY)
                .map_err(|err| (kind, err))?
            {
                tracing::info!(kind = %kind, collection = name, "Created search collection");
                created.push(kind);
            }
        }
        Ok(created)
    }

    fn resync_kind(&self, kind: EntityKind) -> Result<usize> {
        let documents = match kind {
            EntityKind::Product => project_all(&self.records.list_products()?),
            EntityKind::Category => project_all(&self.records.list_categories()?),
            EntityKind::Attribute => project_all(&self.records.list_attributes()?),
        };
        Ok(self
            .index
            .replace_all_documents(self.collection(kind), &documents)?)
    }

    /// Logs and discards a propagation outcome.
    ///
    /// Every propagation call site funnels through here, so the decision to
    /// swallow an index fault is explicit. Returns true on success.
    pub fn discard(
        result: IndexResult<()>,
        kind: EntityKind,
        operation: &'static str,
        ids: &[i64],
    ) -> bool {
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "index_propagation_total",
            "kind" => kind.as_str(),
            "operation" => operation,
            "status" => status
        )
        .increment(1);

        match result {
            Ok(()) => {
                tracing::debug!(kind = %kind, ?ids, operation, "Propagated to search index");
                true
            },
            Err(err) => {
                tracing::warn!(
                    kind = %kind,
                    ?ids,
                    operation,
                    error = %err,
                    "Search index propagation failed; index stale until next push or resync"
                );
                false
            },
        }
    }

    fn upsert<T: Indexable>(&self, rows: &[T]) {
        if rows.is_empty() {
            return;
        }
        let documents: Vec<Document> = project_all(rows);
        let ids: Vec<i64> = rows.iter().map(Indexable::index_id).collect();
        Self::discard(
            self.index.upsert_documents(self.collection(T::KIND), &documents),
            T::KIND,
            "upsert_documents",
            &ids,
        );
    }

    fn delete_many(&self, kind: EntityKind, ids: &[i64]) {
        if ids.is_empty() {
            return;
        }
        Self::discard(
            self.index.delete_documents(self.collection(kind), ids),
            kind,
            "delete_documents",
            ids,
        );
    }

    fn delete_one(&self, kind: EntityKind, id: i64) {
        Self::discard(
            self.index.delete_document(self.collection(kind), id),
            kind,
            "delete_document",
            &[id],
        );
    }

    /// Propagates a created product and the attributes written with it.
    #[instrument(skip_all, fields(product.id = product.id, attributes = attributes.len()))]
    pub fn on_product_created(&self, product: &Product, attributes: &[Attribute]) {
        self.upsert(std::slice::from_ref(product));
        self.upsert(attributes);
    }

    /// Propagates an updated product whose attribute set was replaced.
    ///
    /// Documents for `replaced_attribute_ids` are removed before the new
    /// attributes are pushed.
    #[instrument(skip_all, fields(product.id = product.id, attributes = attributes.len(), replaced = replaced_attribute_ids.len()))]
    pub fn on_product_updated(
        &self,
        product: &Product,
        attributes: &[Attribute],
        replaced_attribute_ids: &[i64],
    ) {
        self.upsert(std::slice::from_ref(product));
        let stale: Vec<i64> = replaced_attribute_ids
            .iter()
            .copied()
            .filter(|id| !attributes.iter().any(|a| a.id == *id))
            .collect();
        self.delete_many(EntityKind::Attribute, &stale);
        self.upsert(attributes);
    }

    /// Propagates a deleted product and its cascaded attributes.
    ///
    /// `attribute_ids` must be captured before the delete. Both deletes are
    /// attempted regardless of each other's outcome.
    #[instrument(skip_all, fields(product.id = id, attributes = attribute_ids.len()))]
    pub fn on_product_deleted(&self, id: i64, attribute_ids: &[i64]) {
        self.delete_many(EntityKind::Attribute, attribute_ids);
        self.delete_one(EntityKind::Product, id);
    }

    /// Propagates a created category.
    #[instrument(skip_all, fields(category.id = category.id))]
    pub fn on_category_created(&self, category: &Category) {
        self.upsert(std::slice::from_ref(category));
    }

    /// Propagates an updated category.
    #[instrument(skip_all, fields(category.id = category.id))]
    pub fn on_category_updated(&self, category: &Category) {
        self.upsert(std::slice::from_ref(category));
    }

    /// Propagates a deleted category.
    #[instrument(skip(self), fields(category.id = id))]
    pub fn on_category_deleted(&self, id: i64) {
        self.delete_one(EntityKind::Category, id);
    }

    /// Propagates a created attribute.
    #[instrument(skip_all, fields(attribute.id = attribute.id))]
    pub fn on_attribute_created(&self, attribute: &Attribute) {
        self.upsert(std::slice::from_ref(attribute));
    }

    /// Propagates an updated attribute.
    #[instrument(skip_all, fields(attribute.id = attribute.id))]
    pub fn on_attribute_updated(&self, attribute: &Attribute) {
        self.upsert(std::slice::from_ref(attribute));
    }

    /// Propagates a deleted attribute.
    #[instrument(skip(self), fields(attribute.id = id))]
    pub fn on_attribute_deleted(&self, id: i64) {
        self.delete_one(EntityKind::Attribute, id);
    }

    /// Queries the collection for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot answer.
    #[instrument(skip(self), fields(operation = "search"))]
    pub fn search(&self, kind: EntityKind, query: &str) -> Result<Vec<Document>> {
        Ok(self.index.search(self.collection(kind), query)?)
    }

    /// Reports composite health.
    ///
    /// Healthy only when the backend reports `available`; anything else is
    /// degraded, never unhealthy.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let search = self.index.health();
        let status = if search.is_available() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        HealthReport {
            status,
            database: "ok",
            search,
            resync_required: self.is_degraded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCategory, NewProduct};
    use crate::storage::{IndexError, InMemorySearchBackend, SqliteRecordStore};

    fn fixture() -> (Arc<SqliteRecordStore>, Arc<InMemorySearchBackend>, IndexSyncService) {
        let records = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let index = Arc::new(InMemorySearchBackend::new());
        let service = IndexSyncService::new(
            records.clone(),
            index.clone(),
            CollectionNames::default(),
        );
        (records, index, service)
    }

    #[test]
    fn test_resync_creates_collections_and_mirrors_records() {
        let (records, index, service) = fixture();
        let category = records.create_category(&NewCategory::new("Tools")).unwrap();
        records
            .create_product(&NewProduct::new("Hammer", category.id).with_attribute("w", "1kg"))
            .unwrap();

        let report = service.startup_resync().unwrap();
        assert!(report.is_complete());
        assert_eq!(report.created_collections, EntityKind::all().to_vec());
        assert_eq!(report.count_for(EntityKind::Product), Some(1));
        assert_eq!(report.count_for(EntityKind::Category), Some(1));
        assert_eq!(report.count_for(EntityKind::Attribute), Some(1));
        assert_eq!(index.documents("products").len(), 1);
        assert!(!service.is_degraded());

        let again = service.startup_resync().unwrap();
        assert!(again.created_collections.is_empty());
    }

    #[test]
    fn test_update_removes_replaced_attribute_documents() {
        let (records, index, service) = fixture();
        service.startup_resync().unwrap();
        let category = records.create_category(&NewCategory::new("Tools")).unwrap();
        let created = records
            .create_product(&NewProduct::new("Hammer", category.id).with_attribute("a", "1"))
            .unwrap();
        service.on_product_created(&created.product, &created.attributes);

        let replacement = records
            .update_product(
                created.product.id,
                &NewProduct::new("Hammer", category.id).with_attribute("b", "2"),
            )
            .unwrap();
        service.on_product_updated(
            &replacement.detail.product,
            &replacement.detail.attributes,
            &replacement.replaced_attribute_ids,
        );

        let docs = index.documents("attributes");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("name"), Some("b"));
    }

    #[test]
    fn test_discard_reports_outcome() {
        assert!(IndexSyncService::discard(Ok(()), EntityKind::Product, "upsert_documents", &[1]));
        let failed = Err(IndexError::Unreachable {
            operation: "upsert_documents",
            cause: "refused".to_string(),
        });
        assert!(!IndexSyncService::discard(
            failed,
            EntityKind::Product,
            "upsert_documents",
            &[1]
        ));
    }

    #[test]
    fn test_search_missing_collection_is_error() {
        let (_records, _index, service) = fixture();
        assert!(service.search(EntityKind::Product, "hammer").is_err());
    }

    #[test]
    fn test_health_healthy_with_available_backend() {
        let (_records, _index, service) = fixture();
        let report = service.health();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.database, "ok");
        assert!(!report.resync_required);
    }

    #[test]
    fn test_health_report_serializes_lowercase() {
        let report = HealthReport {
            status: HealthStatus::Degraded,
            database: "ok",
            search: BackendHealth::Unavailable,
            resync_required: true,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "degraded");
        assert_eq!(value["search"], "unavailable");
    }

    #[test]
    fn test_millis_rounds_to_one_decimal() {
        assert!((millis(Duration::from_micros(12_345)) - 12.3).abs() < f64::EPSILON);
    }
}
