//! Health CLI command.

use crate::services::IndexSyncService;
use std::io::Write;

/// Prints composite health as text or JSON.
///
/// # Errors
///
/// Returns an error if output cannot be written or serialized.
pub fn cmd_health(sync: &IndexSyncService, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let report = sync.health();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    writeln!(out, "Status:   {}", report.status.as_str())?;
    writeln!(out, "Database: {}", report.database)?;
    writeln!(out, "Search:   {}", report.search)?;
    if report.resync_required {
        writeln!(out, "Resync required: last resync did not complete")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionNames;
    use crate::storage::{InMemorySearchBackend, SqliteRecordStore};
    use std::sync::Arc;

    #[test]
    fn test_health_json() {
        let sync = IndexSyncService::new(
            Arc::new(SqliteRecordStore::in_memory().unwrap()),
            Arc::new(InMemorySearchBackend::new()),
            CollectionNames::default(),
        );
        let mut out = Vec::new();
        cmd_health(&sync, true, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["database"], "ok");
        assert_eq!(value["search"], "available");
        assert_eq!(value["resync_required"], false);
    }
}
