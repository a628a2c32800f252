//! Metrics recording for `SQLite` operations.

use std::time::Instant;

/// Records operation metrics for a record-store call.
///
/// Emits `storage_operations_total` (counter, by status) and
/// `storage_operation_duration_ms` (histogram).
pub fn record_operation_metrics(operation: &'static str, start: Instant, status: &'static str) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Runs `call` and records its outcome under `operation`.
pub fn observe<T, E, F>(operation: &'static str, call: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    let result = call();
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(operation, start, status);
    result
}
