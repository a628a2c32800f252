//! In-memory search backend.
//!
//! Id-keyed collections held in process memory. Queries match documents whose
//! string fields contain every whitespace-separated query term, ignoring case.
//! An empty query matches everything.

use crate::models::Document;
use crate::storage::traits::{BackendHealth, IndexError, IndexResult, SearchBackend};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = HashMap<String, BTreeMap<i64, Document>>;

/// In-memory [`SearchBackend`].
#[derive(Debug, Default)]
pub struct InMemorySearchBackend {
    collections: RwLock<Collections>,
}

impl InMemorySearchBackend {
    /// Creates an empty backend with no collections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every document in `collection`, ordered by id.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.read()
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the document with `id`, if present.
    #[must_use]
    pub fn document(&self, collection: &str, id: i64) -> Option<Document> {
        self.read().get(collection).and_then(|docs| docs.get(&id).cloned())
    }

    /// Returns true if the collection has been created.
    #[must_use]
    pub fn has_collection(&self, collection: &str) -> bool {
        self.read().contains_key(collection)
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.collections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn keyed(operation: &'static str, documents: &[Document]) -> IndexResult<Vec<(i64, Document)>> {
        documents
            .iter()
            .map(|doc| {
                doc.id()
                    .map(|id| (id, doc.clone()))
                    .ok_or_else(|| IndexError::Rejected {
                        operation,
                        status: 400,
                        message: "document is missing an integer primary key".to_string(),
                    })
            })
            .collect()
    }

    fn missing(operation: &'static str, collection: &str) -> IndexError {
        IndexError::Rejected {
            operation,
            status: 404,
            message: format!("collection '{collection}' not found"),
        }
    }
}

fn matches_terms(doc: &Document, terms: &[String]) -> bool {
    let haystack: Vec<String> = doc
        .fields()
        .values()
        .filter_map(|value| match value {
            Value::String(s) => Some(s.to_lowercase()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();
    terms
        .iter()
        .all(|term| haystack.iter().any(|field| field.contains(term.as_str())))
}

impl SearchBackend for InMemorySearchBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn ensure_collection_exists(&self, name: &str, _primary_key: &str) -> IndexResult<bool> {
        let mut collections = self.write();
        if collections.contains_key(name) {
            return Ok(false);
        }
        collections.insert(name.to_string(), BTreeMap::new());
        Ok(true)
    }

    fn replace_all_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> IndexResult<usize> {
        const OPERATION: &str = "replace_all_documents";
        let keyed = Self::keyed(OPERATION, documents)?;
        let mut collections = self.write();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing(OPERATION, collection))?;
        docs.clear();
        docs.extend(keyed);
        Ok(documents.len())
    }

    fn upsert_documents(&self, collection: &str, documents: &[Document]) -> IndexResult<()> {
        const OPERATION: &str = "upsert_documents";
        if documents.is_empty() {
            return Ok(());
        }
        let keyed = Self::keyed(OPERATION, documents)?;
        let mut collections = self.write();
        collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing(OPERATION, collection))?
            .extend(keyed);
        Ok(())
    }

    fn delete_documents(&self, collection: &str, ids: &[i64]) -> IndexResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut collections = self.write();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing("delete_documents", collection))?;
        for id in ids {
            docs.remove(id);
        }
        Ok(())
    }

    fn search(&self, collection: &str, query: &str) -> IndexResult<Vec<Document>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let collections = self.read();
        let docs = collections
            .get(collection)
            .ok_or_else(|| Self::missing("search", collection))?;
        Ok(docs
            .values()
            .filter(|doc| matches_terms(doc, &terms))
            .cloned()
            .collect())
    }

    fn health(&self) -> BackendHealth {
        BackendHealth::Available
    }
}
