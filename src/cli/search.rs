//! Search CLI command.

use crate::models::EntityKind;
use crate::services::IndexSyncService;
use anyhow::Context;
use std::io::Write;

/// Queries the collection for `kind` and prints one JSON document per line.
///
/// # Errors
///
/// Returns an error if `kind` is unknown or the search backend cannot answer.
pub fn cmd_search(
    sync: &IndexSyncService,
    kind: &str,
    query: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let kind = EntityKind::parse(kind).ok_or_else(|| {
        anyhow::anyhow!("unknown collection '{kind}' (expected products, categories, or attributes)")
    })?;
    let hits = sync
        .search(kind, query)
        .with_context(|| format!("searching {}", kind.plural()))?;

    for hit in &hits {
        writeln!(out, "{}", serde_json::to_string(hit)?)?;
    }
    writeln!(out, "{} {} matched", hits.len(), kind.plural())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionNames;
    use crate::models::Document;
    use crate::storage::{InMemorySearchBackend, SearchBackend, SqliteRecordStore};
    use std::sync::Arc;

    fn sync_with_products() -> IndexSyncService {
        let index = Arc::new(InMemorySearchBackend::new());
        index.ensure_collection_exists("products", "id").unwrap();
        index
            .upsert_documents(
                "products",
                &[Document::new().with_field("id", 1).with_field("name", "Hammer")],
            )
            .unwrap();
        IndexSyncService::new(
            Arc::new(SqliteRecordStore::in_memory().unwrap()),
            index,
            CollectionNames::default(),
        )
    }

    #[test]
    fn test_search_prints_hits() {
        let mut out = Vec::new();
        cmd_search(&sync_with_products(), "products", "hammer", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#""name":"Hammer""#));
        assert!(text.ends_with("1 products matched\n"));
    }

    #[test]
    fn test_search_unknown_kind() {
        let mut out = Vec::new();
        assert!(cmd_search(&sync_with_products(), "widgets", "x", &mut out).is_err());
    }
}
