//! System-of-record implementations.
//!
//! Available backends:
//! - [`SqliteRecordStore`]: `SQLite` database with WAL and enforced foreign keys

mod sqlite;

pub use sqlite::SqliteRecordStore;
