//! Shared `SQLite` infrastructure for the record store.
//!
//! - [`connection`]: `Mutex<Connection>` lock acquisition and pragma configuration
//! - [`rows`]: row conversion for the catalog tables
//! - [`metrics`]: operation metrics recording

mod connection;
mod metrics;
mod rows;

pub use connection::{BUSY_TIMEOUT_MS, acquire_lock, configure_connection};
pub use metrics::{observe, record_operation_metrics};
pub use rows::{
    ATTRIBUTE_COLUMNS, CATEGORY_COLUMNS, PRODUCT_COLUMNS, attribute_from_row, category_from_row,
    product_from_row,
};
