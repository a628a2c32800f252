//! Index synchronization integration tests.
//!
//! Drives the catalog write path and startup resync against a real `SQLite`
//! record store and a fault-injecting search backend:
//! - Resync correctness and partial failure
//! - Upsert and delete idempotence
//! - Cascade on product delete
//! - Fault isolation during propagation
//! - Composite health

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use rapidstock::config::{CollectionNames, SearchConfig};
use rapidstock::models::{
    Document, EntityKind, NewAttribute, NewCategory, NewProduct, ProductDetail,
};
use rapidstock::services::{BackendFactory, HealthStatus, ServiceSet};
use rapidstock::storage::{
    BackendHealth, InMemorySearchBackend, IndexError, IndexResult, RecordStore,
    ResilientSearchBackend, SearchBackend, SqliteRecordStore, StorageResilienceConfig,
};
use rapidstock::Error;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============================================================================
// Fault-injecting backend
// ============================================================================

/// In-memory backend whose calls can be made to fail on demand.
#[derive(Default)]
struct FaultyBackend {
    inner: InMemorySearchBackend,
    /// Every call fails as unreachable.
    down: AtomicBool,
    /// `replace_all_documents` fails for these collections.
    failing_replaces: Mutex<HashSet<String>>,
    /// Deletes fail for these collections.
    failing_deletes: Mutex<HashSet<String>>,
    /// Reported health when not down.
    health: Mutex<Option<BackendHealth>>,
    calls: AtomicUsize,
}

impl FaultyBackend {
    fn new() -> Self {
        Self::default()
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn fail_replace_of(&self, collection: &str) {
        self.failing_replaces
            .lock()
            .unwrap()
            .insert(collection.to_string());
    }

    fn fail_deletes_in(&self, collection: &str) {
        self.failing_deletes
            .lock()
            .unwrap()
            .insert(collection.to_string());
    }

    fn set_health(&self, health: BackendHealth) {
        *self.health.lock().unwrap() = Some(health);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self, operation: &'static str) -> IndexResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(IndexError::Unreachable {
                operation,
                cause: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn ids(&self, collection: &str) -> Vec<i64> {
        self.inner
            .documents(collection)
            .iter()
            .filter_map(Document::id)
            .collect()
    }
}

impl SearchBackend for FaultyBackend {
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn ensure_collection_exists(&self, name: &str, primary_key: &str) -> IndexResult<bool> {
        self.gate("ensure_collection_exists")?;
        self.inner.ensure_collection_exists(name, primary_key)
    }

    fn replace_all_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> IndexResult<usize> {
        self.gate("replace_all_documents")?;
        if self.failing_replaces.lock().unwrap().contains(collection) {
            return Err(IndexError::Unreachable {
                operation: "replace_all_documents",
                cause: "connection reset".to_string(),
            });
        }
        self.inner.replace_all_documents(collection, documents)
    }

    fn upsert_documents(&self, collection: &str, documents: &[Document]) -> IndexResult<()> {
        self.gate("upsert_documents")?;
        self.inner.upsert_documents(collection, documents)
    }

    fn delete_documents(&self, collection: &str, ids: &[i64]) -> IndexResult<()> {
        self.gate("delete_documents")?;
        if self.failing_deletes.lock().unwrap().contains(collection) {
            return Err(IndexError::Timeout {
                operation: "delete_documents",
                timeout_ms: 10_000,
            });
        }
        self.inner.delete_documents(collection, ids)
    }

    fn search(&self, collection: &str, query: &str) -> IndexResult<Vec<Document>> {
        self.gate("search")?;
        self.inner.search(collection, query)
    }

    fn health(&self) -> BackendHealth {
        if self.down.load(Ordering::SeqCst) {
            return BackendHealth::Unavailable;
        }
        self.health
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(BackendHealth::Available)
    }
}

/// Lets a test keep a handle on a backend it hands to a wrapper.
struct Shared(Arc<FaultyBackend>);
impl SearchBackend for Shared {
    fn name(&self) -> &'static str {
        self.0.name()
    }
    fn ensure_collection_exists(&self, name: &str, key: &str) -> IndexResult<bool> {
        self.0.ensure_collection_exists(name, key)
    }
    fn replace_all_documents(&self, c: &str, d: &[Document]) -> IndexResult<usize> {
        self.0.replace_all_documents(c, d)
    }
    fn upsert_documents(&self, c: &str, d: &[Document]) -> IndexResult<()> {
        self.0.upsert_documents(c, d)
    }
    fn delete_documents(&self, c: &str, ids: &[i64]) -> IndexResult<()> {
        self.0.delete_documents(c, ids)
    }
    fn search(&self, c: &str, q: &str) -> IndexResult<Vec<Document>> {
        self.0.search(c, q)
    }
    fn health(&self) -> BackendHealth {
        self.0.health()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    records: Arc<SqliteRecordStore>,
    index: Arc<FaultyBackend>,
    services: ServiceSet,
}

fn harness() -> Harness {
    let records = Arc::new(SqliteRecordStore::in_memory().unwrap());
    let index = Arc::new(FaultyBackend::new());
    let services =
        BackendFactory::create_services_with(records.clone(), index.clone(), &SearchConfig::default());
    Harness {
        records,
        index,
        services,
    }
}

/// Seeds 2 categories, 3 products, and 4 attributes directly in the record store.
fn seed(records: &SqliteRecordStore) {
    let tools = records
        .create_category(&NewCategory::new("Tools").with_description("Hand tools"))
        .unwrap();
    let fasteners = records.create_category(&NewCategory::new("Fasteners")).unwrap();

    records
        .create_product(
            &NewProduct::new("Hammer", tools.id)
                .with_description("Claw hammer")
                .with_attribute("weight", "600g")
                .with_attribute("handle", "fiberglass"),
        )
        .unwrap();
    records
        .create_product(&NewProduct::new("Wrench", tools.id).with_attribute("size", "13mm"))
        .unwrap();
    records
        .create_product(&NewProduct::new("Bolt", fasteners.id).with_attribute("thread", "M8"))
        .unwrap();
}

fn sorted(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids
}

// ============================================================================
// Startup resync
// ============================================================================

#[test]
fn test_resync_mirrors_record_store() {
    let h = harness();
    seed(&h.records);

    let report = h.services.sync.startup_resync().unwrap();

    assert!(report.is_complete());
    assert_eq!(report.created_collections, EntityKind::all().to_vec());
    assert_eq!(report.count_for(EntityKind::Product), Some(3));
    assert_eq!(report.count_for(EntityKind::Category), Some(2));
    assert_eq!(report.count_for(EntityKind::Attribute), Some(4));

    let products = h.index.inner.documents("products");
    assert_eq!(products.len(), 3);
    let hammer = products
        .iter()
        .find(|doc| doc.get_str("name") == Some("Hammer"))
        .unwrap();
    assert_eq!(hammer.get_str("description"), Some("Claw hammer"));
    assert_eq!(hammer.get("category_id").and_then(serde_json::Value::as_i64), Some(1));

    assert_eq!(h.index.inner.documents("categories").len(), 2);
    assert_eq!(
        sorted(h.index.ids("attributes")),
        sorted(h.records.list_attributes().unwrap().iter().map(|a| a.id).collect())
    );
    assert!(!h.services.sync.is_degraded());
}

#[test]
fn test_resync_replaces_stale_documents() {
    let h = harness();
    seed(&h.records);
    h.index.inner.ensure_collection_exists("products", "id").unwrap();
    h.index
        .inner
        .upsert_documents("products", &[Document::new().with_field("id", 999)])
        .unwrap();

    let report = h.services.sync.startup_resync().unwrap();

    assert!(!report.created_collections.contains(&EntityKind::Product));
    assert_eq!(sorted(h.index.ids("products")), vec![1, 2, 3]);
}

#[test]
fn test_resync_of_empty_database_clears_collections() {
    let h = harness();
    h.index.inner.ensure_collection_exists("categories", "id").unwrap();
    h.index
        .inner
        .upsert_documents("categories", &[Document::new().with_field("id", 7)])
        .unwrap();

    let report = h.services.sync.startup_resync().unwrap();

    assert!(report.is_complete());
    assert_eq!(report.total_documents(), 0);
    assert!(h.index.inner.documents("categories").is_empty());
}

#[test]
fn test_resync_partial_failure_reports_each_kind() {
    let h = harness();
    seed(&h.records);
    h.index.fail_replace_of("categories");

    let report = h.services.sync.startup_resync().unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.count_for(EntityKind::Product), Some(3));
    let failed = report.failed.as_ref().unwrap();
    assert_eq!(failed.kind, EntityKind::Category);
    assert!(failed.error.contains("replace_all_documents"));
    assert_eq!(report.skipped, vec![EntityKind::Attribute]);

    assert_eq!(h.index.inner.documents("products").len(), 3);
    assert!(h.index.inner.documents("attributes").is_empty());
    assert!(h.services.sync.is_degraded());
    assert!(h.services.sync.health().resync_required);
}

#[test]
fn test_resync_bootstrap_failure_is_escalated() {
    let h = harness();
    seed(&h.records);
    h.index.set_down(true);

    let err = h.services.sync.startup_resync().unwrap_err();

    assert!(matches!(err, Error::SearchUnavailable(_)));
    assert!(h.services.sync.is_degraded());
}

#[test]
fn test_complete_resync_clears_degraded() {
    let h = harness();
    seed(&h.records);
    h.index.set_down(true);
    assert!(h.services.sync.startup_resync().is_err());

    h.index.set_down(false);
    let report = h.services.sync.startup_resync().unwrap();

    assert!(report.is_complete());
    assert!(!h.services.sync.is_degraded());
}

// ============================================================================
// Propagation
// ============================================================================

#[test]
fn test_upsert_twice_keeps_last_fields() {
    let h = harness();
    h.services.sync.startup_resync().unwrap();
    let catalog = &h.services.catalog;

    let category = catalog.create_category(&NewCategory::new("Tools")).unwrap();
    catalog
        .update_category(category.id, &NewCategory::new("Tools").with_description("v1"))
        .unwrap();
    catalog
        .update_category(category.id, &NewCategory::new("Tools").with_description("v2"))
        .unwrap();

    let docs = h.index.inner.documents("categories");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get_str("description"), Some("v2"));
}

#[test]
fn test_deleting_absent_document_succeeds() {
    let h = harness();
    h.services.sync.startup_resync().unwrap();

    h.index.delete_document("products", 404).unwrap();
    h.index.delete_documents("attributes", &[1, 2, 3]).unwrap();
}

#[test]
fn test_product_delete_cascades_to_attribute_collection() {
    let h = harness();
    h.services.sync.startup_resync().unwrap();
    let catalog = &h.services.catalog;

    let category = catalog.create_category(&NewCategory::new("Tools")).unwrap();
    let detail = catalog
        .create_product(
            &NewProduct::new("Hammer", category.id)
                .with_attribute("weight", "600g")
                .with_attribute("handle", "wood"),
        )
        .unwrap();
    assert_eq!(h.index.inner.documents("attributes").len(), 2);

    catalog.delete_product(detail.product.id).unwrap();

    for attribute in &detail.attributes {
        assert!(h.index.inner.document("attributes", attribute.id).is_none());
    }
    assert!(h.index.inner.document("products", detail.product.id).is_none());
    assert!(h.index.inner.document("categories", category.id).is_some());
}

#[test]
fn test_product_update_removes_replaced_attributes() {
    let h = harness();
    h.services.sync.startup_resync().unwrap();
    let catalog = &h.services.catalog;

    let category = catalog.create_category(&NewCategory::new("Tools")).unwrap();
    let original = catalog
        .create_product(&NewProduct::new("Hammer", category.id).with_attribute("weight", "600g"))
        .unwrap();
    let updated = catalog
        .update_product(
            original.product.id,
            &NewProduct::new("Sledge", category.id).with_attribute("weight", "2kg"),
        )
        .unwrap();

    let attribute_ids = h.index.ids("attributes");
    assert_eq!(
        attribute_ids,
        updated.attributes.iter().map(|a| a.id).collect::<Vec<_>>()
    );
    assert_eq!(
        h.index
            .inner
            .document("products", original.product.id)
            .unwrap()
            .get_str("name"),
        Some("Sledge")
    );
}

#[test]
fn test_attribute_mutations_propagate() {
    let h = harness();
    h.services.sync.startup_resync().unwrap();
    let catalog = &h.services.catalog;

    let category = catalog.create_category(&NewCategory::new("Tools")).unwrap();
    let product = catalog.create_product(&NewProduct::new("Hammer", category.id)).unwrap();
    let attribute = catalog
        .create_attribute(product.product.id, &NewAttribute::new("color", "red"))
        .unwrap();
    catalog
        .update_attribute(attribute.id, &NewAttribute::new("color", "blue"))
        .unwrap();

    let hits = h.services.sync.search(EntityKind::Attribute, "blue").unwrap();
    assert_eq!(hits.len(), 1);

    catalog.delete_attribute(attribute.id).unwrap();
    assert!(h.index.inner.documents("attributes").is_empty());
}

#[test]
fn test_propagation_fault_does_not_fail_write() {
    let h = harness();
    h.services.sync.startup_resync().unwrap();
    let catalog = &h.services.catalog;
    h.index.set_down(true);

    let category = catalog.create_category(&NewCategory::new("Tools")).unwrap();
    let detail = catalog
        .create_product(&NewProduct::new("Hammer", category.id).with_attribute("weight", "1kg"))
        .unwrap();
    catalog.delete_product(detail.product.id).unwrap();
    catalog.delete_category(category.id).unwrap();

    // Writes were committed even though every push failed.
    assert!(h.records.list_categories().unwrap().is_empty());
    assert!(h.records.get_product(detail.product.id).unwrap().is_none());
    assert!(h.index.calls() > 0);
}

/// Creates a product with two attributes after a clean resync.
fn indexed_product(h: &Harness) -> ProductDetail {
    h.services.sync.startup_resync().unwrap();
    let catalog = &h.services.catalog;
    let category = catalog.create_category(&NewCategory::new("Tools")).unwrap();
    let detail = catalog
        .create_product(
            &NewProduct::new("Hammer", category.id)
                .with_attribute("weight", "600g")
                .with_attribute("handle", "wood"),
        )
        .unwrap();
    assert_eq!(h.index.inner.documents("attributes").len(), 2);
    detail
}

#[test]
fn test_product_delete_still_removes_product_when_attribute_delete_fails() {
    let h = harness();
    let detail = indexed_product(&h);
    h.index.fail_deletes_in("attributes");

    h.services.catalog.delete_product(detail.product.id).unwrap();

    assert!(h.records.get_product(detail.product.id).unwrap().is_none());
    assert!(h.index.inner.document("products", detail.product.id).is_none());
    assert_eq!(
        sorted(h.index.ids("attributes")),
        sorted(detail.attributes.iter().map(|a| a.id).collect())
    );
}

#[test]
fn test_product_delete_still_removes_attributes_when_product_delete_fails() {
    let h = harness();
    let detail = indexed_product(&h);
    h.index.fail_deletes_in("products");

    h.services.catalog.delete_product(detail.product.id).unwrap();

    assert!(h.records.get_product(detail.product.id).unwrap().is_none());
    assert!(h.index.inner.documents("attributes").is_empty());
    assert!(h.index.inner.document("products", detail.product.id).is_some());

    // The leftover product document is gone after the next resync.
    h.services.sync.startup_resync().unwrap();
    assert!(h.index.inner.documents("products").is_empty());
}

#[test]
fn test_stale_index_heals_on_resync() {
    let h = harness();
    h.services.sync.startup_resync().unwrap();
    let catalog = &h.services.catalog;

    h.index.set_down(true);
    catalog.create_category(&NewCategory::new("Tools")).unwrap();
    h.index.set_down(false);
    assert!(h.index.inner.documents("categories").is_empty());

    h.services.sync.startup_resync().unwrap();
    assert_eq!(h.index.inner.documents("categories").len(), 1);
}

#[test]
fn test_rejected_write_is_not_propagated() {
    let h = harness();
    h.services.sync.startup_resync().unwrap();
    let calls = h.index.calls();

    let err = h
        .services
        .catalog
        .create_product(&NewProduct::new("Orphan", 42))
        .unwrap_err();

    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(h.index.calls(), calls);
}

#[test]
fn test_open_breaker_is_swallowed_like_any_fault() {
    let records = Arc::new(SqliteRecordStore::in_memory().unwrap());
    let faulty = Arc::new(FaultyBackend::new());
    faulty.set_down(true);
    let breaker = StorageResilienceConfig::default()
        .with_failure_threshold(1)
        .with_reset_timeout_ms(60_000);

    let index = Arc::new(ResilientSearchBackend::new(Shared(faulty.clone()), &breaker));
    let services = BackendFactory::create_services_with(records, index, &SearchConfig::default());

    services.catalog.create_category(&NewCategory::new("A")).unwrap();
    let after_trip = faulty.calls();
    services.catalog.create_category(&NewCategory::new("B")).unwrap();

    assert_eq!(faulty.calls(), after_trip);
    assert_eq!(services.catalog.list_categories().unwrap().len(), 2);
}

// ============================================================================
// Search and health
// ============================================================================

#[test]
fn test_search_fault_is_returned() {
    let h = harness();
    h.services.sync.startup_resync().unwrap();
    h.index.set_down(true);

    assert!(h.services.sync.search(EntityKind::Product, "hammer").is_err());
}

#[test]
fn test_health_composite() {
    let h = harness();

    let report = h.services.sync.health();
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.database, "ok");

    h.index.set_health(BackendHealth::Unknown("indexing".to_string()));
    assert_eq!(h.services.sync.health().status, HealthStatus::Degraded);

    h.index.set_down(true);
    let report = h.services.sync.health();
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.search, BackendHealth::Unavailable);
}

#[test]
fn test_custom_collection_names() {
    let records = Arc::new(SqliteRecordStore::in_memory().unwrap());
    let index = Arc::new(InMemorySearchBackend::new());
    let config = SearchConfig {
        collections: CollectionNames {
            products: "shop_products".to_string(),
            categories: "shop_categories".to_string(),
            attributes: "shop_attributes".to_string(),
        },
        ..SearchConfig::default()
    };
    let services = BackendFactory::create_services_with(records, index.clone(), &config);
    services.sync.startup_resync().unwrap();

    services.catalog.create_category(&NewCategory::new("Tools")).unwrap();

    assert!(index.has_collection("shop_products"));
    assert_eq!(index.documents("shop_categories").len(), 1);
    assert!(!index.has_collection("categories"));
}

#[test]
fn test_file_backed_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog").join("rapidstock.db");

    {
        let records = SqliteRecordStore::new(&path).unwrap();
        seed(&records);
    }

    let records = Arc::new(SqliteRecordStore::new(&path).unwrap());
    let index = Arc::new(InMemorySearchBackend::new());
    let services = BackendFactory::create_services_with(records, index.clone(), &SearchConfig::default());
    let report = services.sync.startup_resync().unwrap();

    assert_eq!(report.total_documents(), 9);
    assert_eq!(index.documents("products").len(), 3);
}
