//! Resync CLI command.

use crate::services::{IndexSyncService, ResyncReport};
use std::io::Write;

/// Runs the startup resync, tolerating a search outage.
///
/// Returns the report when collection bootstrap succeeded, `None` otherwise.
/// Bootstrap faults are already logged by the service.
pub fn run_startup_resync(sync: &IndexSyncService) -> Option<ResyncReport> {
    match sync.startup_resync() {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(error = %e, "Continuing without search");
            None
        },
    }
}

/// Prints a resync report.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn cmd_resync(report: Option<&ResyncReport>, out: &mut impl Write) -> anyhow::Result<()> {
    let Some(report) = report else {
        writeln!(out, "Search unavailable: collections could not be bootstrapped.")?;
        writeln!(out, "Catalog commands still work; run `rapidstock resync` once search is back.")?;
        return Ok(());
    };

    for kind in &report.created_collections {
        writeln!(out, "Created collection for {kind}")?;
    }
    for synced in &report.synced {
        writeln!(
            out,
            "{:<10} {:>6} documents  {:>8.1} ms",
            synced.kind.plural(),
            synced.count,
            synced.elapsed.as_secs_f64() * 1000.0
        )?;
    }
    if let Some(failed) = &report.failed {
        writeln!(out, "{:<10} FAILED: {}", failed.kind.plural(), failed.error)?;
    }
    for kind in &report.skipped {
        writeln!(out, "{:<10} skipped", kind.plural())?;
    }
    writeln!(
        out,
        "Resync {} in {:.1} ms",
        if report.is_complete() { "complete" } else { "incomplete" },
        report.elapsed.as_secs_f64() * 1000.0
    )?;
    Ok(())
}
