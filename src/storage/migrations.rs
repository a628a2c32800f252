//! `SQLite` migration system for the catalog schema.
//!
//! Migrations are embedded at compile time and applied on open. Each one runs
//! in its own transaction together with its version record, so a failing
//! statement leaves the schema at the previous version.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rapidstock::storage::migrations::{CATALOG_MIGRATIONS, MigrationRunner};
//!
//! let mut conn = rusqlite::Connection::open("rapidstock.db")?;
//! MigrationRunner::new(&mut conn).run(CATALOG_MIGRATIONS)?;
//! ```

use crate::{Error, Result};
use rusqlite::{Connection, params};

/// A single migration with version and SQL.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Migration version (sequential, starting at 1).
    pub version: i32,
    /// Human-readable description.
    pub description: &'static str,
    /// SQL to apply (may contain several statements).
    pub sql: &'static str,
}

/// Migrations for the catalog tables.
pub const CATALOG_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create catalog tables",
        sql: r"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT
            );
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                category_id INTEGER NOT NULL REFERENCES categories(id)
            );
            CREATE TABLE IF NOT EXISTS attributes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE
            );
        ",
    },
    Migration {
        version: 2,
        description: "Index lookup columns",
        sql: r"
            CREATE INDEX IF NOT EXISTS idx_categories_name ON categories(name);
            CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);
            CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id);
            CREATE INDEX IF NOT EXISTS idx_attributes_name ON attributes(name);
            CREATE INDEX IF NOT EXISTS idx_attributes_product ON attributes(product_id);
        ",
    },
];

/// Applies pending migrations to a connection.
pub struct MigrationRunner<'a> {
    conn: &'a mut Connection,
}

impl<'a> MigrationRunner<'a> {
    /// Creates a new migration runner.
    pub const fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Runs all pending migrations, returning how many were applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub fn run(&mut self, migrations: &[Migration]) -> Result<usize> {
        self.ensure_migrations_table()?;
        let current = self.current_version()?;

        let mut applied = 0;
        for migration in migrations.iter().filter(|m| m.version > current) {
            self.apply_migration(migration)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Returns the current schema version (0 for a fresh database).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    pub fn current_version(&self) -> Result<i32> {
        self.conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::OperationFailed {
                operation: "migration_current_version".to_string(),
                cause: e.to_string(),
            })
    }

    fn ensure_migrations_table(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    description TEXT NOT NULL,
                    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )
            .map_err(|e| Error::OperationFailed {
                operation: "create_migrations_table".to_string(),
                cause: e.to_string(),
            })?;
        Ok(())
    }

    fn apply_migration(&mut self, migration: &Migration) -> Result<()> {
        let tx = self.conn.transaction().map_err(|e| Error::OperationFailed {
            operation: format!("migration_v{}_begin_tx", migration.version),
            cause: e.to_string(),
        })?;

        tx.execute_batch(migration.sql)
            .map_err(|e| Error::OperationFailed {
                operation: format!(
                    "migration_v{}: {}",
                    migration.version, migration.description
                ),
                cause: e.to_string(),
            })?;

        tx.execute(
            "INSERT INTO schema_migrations (version, description) VALUES (?1, ?2)",
            params![migration.version, migration.description],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "record_migration".to_string(),
            cause: e.to_string(),
        })?;

        tx.commit().map_err(|e| Error::OperationFailed {
            operation: format!("migration_v{}_commit", migration.version),
            cause: e.to_string(),
        })?;

        tracing::info!(
            version = migration.version,
            description = migration.description,
            "Applied migration"
        );
        Ok(())
    }
}

/// Maximum version across a set of migrations.
#[must_use]
pub fn max_version(migrations: &[Migration]) -> i32 {
    migrations.iter().map(|m| m.version).max().unwrap_or(0)
}
