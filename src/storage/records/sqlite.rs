//! `SQLite`-based record store.
//!
//! The authoritative store for products, categories, and attributes. Every
//! referential-integrity rule is checked inside the same transaction as the
//! write it guards, and `foreign_keys=ON` backs the checks up at the schema level.

use crate::models::{
    Attribute, Category, EntityKind, NewAttribute, NewCategory, NewProduct, Product,
    ProductDetail, ProductReplacement,
};
use crate::storage::migrations::{CATALOG_MIGRATIONS, MigrationRunner};
use crate::storage::sqlite::{
    ATTRIBUTE_COLUMNS, CATEGORY_COLUMNS, PRODUCT_COLUMNS, acquire_lock, attribute_from_row,
    category_from_row, configure_connection, observe, product_from_row,
};
use crate::storage::traits::RecordStore;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::instrument;

/// `SQLite`-based record store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// The database's own commit serializes authoritative writes; WAL mode lets
/// readers from other processes proceed during a write.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Opens (or creates) the catalog database at `db_path`.
    ///
    /// Parent directories are created as needed and pending migrations applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_data_dir".to_string(),
                cause: format!("{}: {e}", parent.display()),
            })?;
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;
        Self::initialize(conn, Some(db_path))
    }

    /// Creates an in-memory record store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_in_memory".to_string(),
            cause: e.to_string(),
        })?;
        Self::initialize(conn, None)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(mut conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        configure_connection(&conn)?;
        let applied = MigrationRunner::new(&mut conn).run(CATALOG_MIGRATIONS)?;
        if applied > 0 {
            tracing::debug!(applied, "Catalog schema migrated");
        }
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn begin<'c>(conn: &'c mut Connection, operation: &str) -> Result<Transaction<'c>> {
        conn.transaction().map_err(sql_error(operation))
    }

    fn commit(tx: Transaction<'_>, operation: &str) -> Result<()> {
        tx.commit().map_err(sql_error(operation))
    }

    fn category_exists(conn: &Connection, id: i64) -> Result<bool> {
        conn.query_row("SELECT 1 FROM categories WHERE id = ?1", [id], |_| Ok(()))
            .optional()
            .map(|row| row.is_some())
            .map_err(sql_error("category_exists"))
    }

    fn fetch_product(conn: &Connection, id: i64) -> Result<Option<Product>> {
        conn.query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
            [id],
            product_from_row,
        )
        .optional()
        .map_err(sql_error("get_product"))
    }

    fn fetch_category(conn: &Connection, id: i64) -> Result<Option<Category>> {
        conn.query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
            [id],
            category_from_row,
        )
        .optional()
        .map_err(sql_error("get_category"))
    }

    fn fetch_attribute(conn: &Connection, id: i64) -> Result<Option<Attribute>> {
        conn.query_row(
            &format!("SELECT {ATTRIBUTE_COLUMNS} FROM attributes WHERE id = ?1"),
            [id],
            attribute_from_row,
        )
        .optional()
        .map_err(sql_error("get_attribute"))
    }

    fn attribute_ids_for(conn: &Connection, product_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn
            .prepare("SELECT id FROM attributes WHERE product_id = ?1 ORDER BY id")
            .map_err(sql_error("attribute_ids_for_product"))?;
        let ids = stmt
            .query_map([product_id], |row| row.get(0))
            .map_err(sql_error("attribute_ids_for_product"))?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .map_err(sql_error("attribute_ids_for_product"))?;
        Ok(ids)
    }

    fn query_all<T>(
        conn: &Connection,
        operation: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = conn.prepare(sql).map_err(sql_error(operation))?;
        let rows = stmt
            .query_map(params, map)
            .map_err(sql_error(operation))?
            .collect::<rusqlite::Result<Vec<T>>>()
            .map_err(sql_error(operation))?;
        Ok(rows)
    }

    /// Inserts attribute rows for a product inside an open transaction.
    fn insert_attributes(
        tx: &Transaction<'_>,
        product_id: i64,
        inputs: &[NewAttribute],
    ) -> Result<Vec<Attribute>> {
        let mut stmt = tx
            .prepare("INSERT INTO attributes (name, value, product_id) VALUES (?1, ?2, ?3)")
            .map_err(sql_error("insert_attribute"))?;

        inputs
            .iter()
            .map(|input| {
                stmt.execute(params![input.name, input.value, product_id])
                    .map_err(sql_error("insert_attribute"))?;
                Ok(Attribute {
                    id: tx.last_insert_rowid(),
                    name: input.name.clone(),
                    value: input.value.clone(),
                    product_id,
                })
            })
            .collect()
    }

    fn require_category(conn: &Connection, category_id: i64) -> Result<()> {
        if Self::category_exists(conn, category_id)? {
            Ok(())
        } else {
            Err(Error::Conflict(format!(
                "category id {category_id} does not exist"
            )))
        }
    }
}

/// Maps a rusqlite error into an `OperationFailed` for `operation`.
fn sql_error(operation: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

impl RecordStore for SqliteRecordStore {
    fn list_products(&self) -> Result<Vec<Product>> {
        observe("list_products", || {
            let conn = acquire_lock(&self.conn);
            Self::query_all(
                &conn,
                "list_products",
                &format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"),
                [],
                product_from_row,
            )
        })
    }

    fn get_product(&self, id: i64) -> Result<Option<Product>> {
        observe("get_product", || {
            let conn = acquire_lock(&self.conn);
            Self::fetch_product(&conn, id)
        })
    }

    #[instrument(skip(self, input), fields(operation = "create_product", category_id = input.category_id))]
    fn create_product(&self, input: &NewProduct) -> Result<ProductDetail> {
        input.validate()?;
        observe("create_product", || {
            let mut conn = acquire_lock(&self.conn);
            let tx = Self::begin(&mut conn, "create_product")?;
            Self::require_category(&tx, input.category_id)?;

            tx.execute(
                "INSERT INTO products (name, description, category_id) VALUES (?1, ?2, ?3)",
                params![input.name, input.description, input.category_id],
            )
            .map_err(sql_error("insert_product"))?;
            let product = Product {
                id: tx.last_insert_rowid(),
                name: input.name.clone(),
                description: input.description.clone(),
                category_id: input.category_id,
            };
            let attributes = Self::insert_attributes(&tx, product.id, &input.attributes)?;

            Self::commit(tx, "create_product")?;
            Ok(ProductDetail {
                product,
                attributes,
            })
        })
    }

    #[instrument(skip(self, input), fields(operation = "update_product", product.id = id))]
    fn update_product(&self, id: i64, input: &NewProduct) -> Result<ProductReplacement> {
        input.validate()?;
        observe("update_product", || {
            let mut conn = acquire_lock(&self.conn);
            let tx = Self::begin(&mut conn, "update_product")?;

            if Self::fetch_product(&tx, id)?.is_none() {
                return Err(Error::NotFound {
                    kind: EntityKind::Product,
                    id,
                });
            }
            Self::require_category(&tx, input.category_id)?;

            tx.execute(
                "UPDATE products SET name = ?1, description = ?2, category_id = ?3 WHERE id = ?4",
                params![input.name, input.description, input.category_id, id],
            )
            .map_err(sql_error("update_product"))?;

            let replaced_attribute_ids = Self::attribute_ids_for(&tx, id)?;
            tx.execute("DELETE FROM attributes WHERE product_id = ?1", [id])
                .map_err(sql_error("replace_attributes"))?;
            let attributes = Self::insert_attributes(&tx, id, &input.attributes)?;

            Self::commit(tx, "update_product")?;
            Ok(ProductReplacement {
                detail: ProductDetail {
                    product: Product {
                        id,
                        name: input.name.clone(),
                        description: input.description.clone(),
                        category_id: input.category_id,
                    },
                    attributes,
                },
                replaced_attribute_ids,
            })
        })
    }

    #[instrument(skip(self), fields(operation = "delete_product", product.id = id))]
    fn delete_product(&self, id: i64) -> Result<Vec<i64>> {
        observe("delete_product", || {
            let mut conn = acquire_lock(&self.conn);
            let tx = Self::begin(&mut conn, "delete_product")?;

            if Self::fetch_product(&tx, id)?.is_none() {
                return Err(Error::NotFound {
                    kind: EntityKind::Product,
                    id,
                });
            }
            let attribute_ids = Self::attribute_ids_for(&tx, id)?;

            tx.execute("DELETE FROM attributes WHERE product_id = ?1", [id])
                .map_err(sql_error("delete_product_attributes"))?;
            tx.execute("DELETE FROM products WHERE id = ?1", [id])
                .map_err(sql_error("delete_product"))?;

            Self::commit(tx, "delete_product")?;
            Ok(attribute_ids)
        })
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        observe("list_categories", || {
            let conn = acquire_lock(&self.conn);
            Self::query_all(
                &conn,
                "list_categories",
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id"),
                [],
                category_from_row,
            )
        })
    }

    fn get_category(&self, id: i64) -> Result<Option<Category>> {
        observe("get_category", || {
            let conn = acquire_lock(&self.conn);
            Self::fetch_category(&conn, id)
        })
    }

    #[instrument(skip(self, input), fields(operation = "create_category"))]
    fn create_category(&self, input: &NewCategory) -> Result<Category> {
        input.validate()?;
        observe("create_category", || {
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "INSERT INTO categories (name, description) VALUES (?1, ?2)",
                params![input.name, input.description],
            )
            .map_err(sql_error("create_category"))?;
            Ok(Category {
                id: conn.last_insert_rowid(),
                name: input.name.clone(),
                description: input.description.clone(),
            })
        })
    }

    #[instrument(skip(self, input), fields(operation = "update_category", category.id = id))]
    fn update_category(&self, id: i64, input: &NewCategory) -> Result<Category> {
        input.validate()?;
        observe("update_category", || {
            let conn = acquire_lock(&self.conn);
            let changed = conn
                .execute(
                    "UPDATE categories SET name = ?1, description = ?2 WHERE id = ?3",
                    params![input.name, input.description, id],
                )
                .map_err(sql_error("update_category"))?;
            if changed == 0 {
                return Err(Error::NotFound {
                    kind: EntityKind::Category,
                    id,
                });
            }
            Ok(Category {
                id,
                name: input.name.clone(),
                description: input.description.clone(),
            })
        })
    }

    #[instrument(skip(self), fields(operation = "delete_category", category.id = id))]
    fn delete_category(&self, id: i64) -> Result<()> {
        observe("delete_category", || {
            let mut conn = acquire_lock(&self.conn);
            let tx = Self::begin(&mut conn, "delete_category")?;

            if !Self::category_exists(&tx, id)? {
                return Err(Error::NotFound {
                    kind: EntityKind::Category,
                    id,
                });
            }
            let referencing: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM products WHERE category_id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .map_err(sql_error("count_category_products"))?;
            if referencing > 0 {
                return Err(Error::Conflict(format!(
                    "category {id} is referenced by {referencing} product(s)"
                )));
            }

            tx.execute("DELETE FROM categories WHERE id = ?1", [id])
                .map_err(sql_error("delete_category"))?;
            Self::commit(tx, "delete_category")
        })
    }

    fn list_attributes(&self) -> Result<Vec<Attribute>> {
        observe("list_attributes", || {
            let conn = acquire_lock(&self.conn);
            Self::query_all(
                &conn,
                "list_attributes",
                &format!("SELECT {ATTRIBUTE_COLUMNS} FROM attributes ORDER BY id"),
                [],
                attribute_from_row,
            )
        })
    }

    fn attributes_for_product(&self, product_id: i64) -> Result<Vec<Attribute>> {
        observe("attributes_for_product", || {
            let conn = acquire_lock(&self.conn);
            Self::query_all(
                &conn,
                "attributes_for_product",
                &format!(
                    "SELECT {ATTRIBUTE_COLUMNS} FROM attributes WHERE product_id = ?1 ORDER BY id"
                ),
                [product_id],
                attribute_from_row,
            )
        })
    }

    #[instrument(skip(self, input), fields(operation = "create_attribute", product.id = product_id))]
    fn create_attribute(&self, product_id: i64, input: &NewAttribute) -> Result<Attribute> {
        input.validate()?;
        observe("create_attribute", || {
            let mut conn = acquire_lock(&self.conn);
            let tx = Self::begin(&mut conn, "create_attribute")?;
            if Self::fetch_product(&tx, product_id)?.is_none() {
                return Err(Error::Conflict(format!(
                    "product id {product_id} does not exist"
                )));
            }
            let mut attributes =
                Self::insert_attributes(&tx, product_id, std::slice::from_ref(input))?;
            Self::commit(tx, "create_attribute")?;
            attributes.pop().ok_or_else(|| Error::OperationFailed {
                operation: "create_attribute".to_string(),
                cause: "insert returned no row".to_string(),
            })
        })
    }

    #[instrument(skip(self, input), fields(operation = "update_attribute", attribute.id = id))]
    fn update_attribute(&self, id: i64, input: &NewAttribute) -> Result<Attribute> {
        input.validate()?;
        observe("update_attribute", || {
            let conn = acquire_lock(&self.conn);
            let changed = conn
                .execute(
                    "UPDATE attributes SET name = ?1, value = ?2 WHERE id = ?3",
                    params![input.name, input.value, id],
                )
                .map_err(sql_error("update_attribute"))?;
            if changed == 0 {
                return Err(Error::NotFound {
                    kind: EntityKind::Attribute,
                    id,
                });
            }
            Self::fetch_attribute(&conn, id)?.ok_or(Error::NotFound {
                kind: EntityKind::Attribute,
                id,
            })
        })
    }

    #[instrument(skip(self), fields(operation = "delete_attribute", attribute.id = id))]
    fn delete_attribute(&self, id: i64) -> Result<()> {
        observe("delete_attribute", || {
            let conn = acquire_lock(&self.conn);
            let changed = conn
                .execute("DELETE FROM attributes WHERE id = ?1", [id])
                .map_err(sql_error("delete_attribute"))?;
            if changed == 0 {
                return Err(Error::NotFound {
                    kind: EntityKind::Attribute,
                    id,
                });
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with_category() -> (SqliteRecordStore, Category) {
        let store = SqliteRecordStore::in_memory().unwrap();
        let category = store
            .create_category(&NewCategory::new("Tools").with_description("Hand tools"))
            .unwrap();
        (store, category)
    }

    #[test]
    fn test_create_product_with_attributes() {
        let (store, category) = store_with_category();
        let input = NewProduct::new("Hammer", category.id)
            .with_attribute("weight", "1kg")
            .with_attribute("color", "red");

        let detail = store.create_product(&input).unwrap();
        assert_eq!(detail.product.name, "Hammer");
        assert_eq!(detail.attributes.len(), 2);
        assert!(detail.attributes.iter().all(|a| a.product_id == detail.product.id));

        let stored = store.attributes_for_product(detail.product.id).unwrap();
        assert_eq!(stored, detail.attributes);
    }

    #[test]
    fn test_create_product_missing_category_is_conflict() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let result = store.create_product(&NewProduct::new("Orphan", 99));
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert!(store.list_products().unwrap().is_empty());
    }

    #[test]
    fn test_create_product_rolls_back_on_invalid_attribute() {
        let (store, category) = store_with_category();
        let input = NewProduct::new("Hammer", category.id).with_attribute(" ", "x");
        assert!(matches!(
            store.create_product(&input),
            Err(Error::InvalidInput(_))
        ));
        assert!(store.list_products().unwrap().is_empty());
    }

    #[test]
    fn test_update_product_replaces_attributes() {
        let (store, category) = store_with_category();
        let created = store
            .create_product(&NewProduct::new("Hammer", category.id).with_attribute("a", "1"))
            .unwrap();
        let old_ids: Vec<i64> = created.attributes.iter().map(|a| a.id).collect();

        let replacement = store
            .update_product(
                created.product.id,
                &NewProduct::new("Sledge", category.id).with_attribute("b", "2"),
            )
            .unwrap();

        assert_eq!(replacement.replaced_attribute_ids, old_ids);
        assert_eq!(replacement.detail.product.name, "Sledge");
        let stored = store.attributes_for_product(created.product.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "b");
    }

    #[test]
    fn test_update_unknown_product_is_not_found() {
        let (store, category) = store_with_category();
        let result = store.update_product(42, &NewProduct::new("Ghost", category.id));
        assert!(matches!(
            result,
            Err(Error::NotFound {
                kind: EntityKind::Product,
                id: 42
            })
        ));
    }

    #[test]
    fn test_delete_product_cascades_and_returns_attribute_ids() {
        let (store, category) = store_with_category();
        let created = store
            .create_product(
                &NewProduct::new("Hammer", category.id)
                    .with_attribute("a", "1")
                    .with_attribute("b", "2"),
            )
            .unwrap();

        let removed = store.delete_product(created.product.id).unwrap();
        let expected: Vec<i64> = created.attributes.iter().map(|a| a.id).collect();
        assert_eq!(removed, expected);
        assert!(store.get_product(created.product.id).unwrap().is_none());
        assert!(store.list_attributes().unwrap().is_empty());
    }

    #[test]
    fn test_delete_referenced_category_is_conflict() {
        let (store, category) = store_with_category();
        store
            .create_product(&NewProduct::new("Hammer", category.id))
            .unwrap();

        assert!(matches!(
            store.delete_category(category.id),
            Err(Error::Conflict(_))
        ));
        assert!(store.get_category(category.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_unreferenced_category() {
        let (store, category) = store_with_category();
        store.delete_category(category.id).unwrap();
        assert!(store.list_categories().unwrap().is_empty());
    }

    #[test]
    fn test_attribute_lifecycle() {
        let (store, category) = store_with_category();
        let product = store
            .create_product(&NewProduct::new("Hammer", category.id))
            .unwrap()
            .product;

        let attr = store
            .create_attribute(product.id, &NewAttribute::new("grip", "rubber"))
            .unwrap();
        let updated = store
            .update_attribute(attr.id, &NewAttribute::new("grip", "wood"))
            .unwrap();
        assert_eq!(updated.value, "wood");
        assert_eq!(updated.product_id, product.id);

        store.delete_attribute(attr.id).unwrap();
        assert!(matches!(
            store.delete_attribute(attr.id),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_create_attribute_missing_product_is_conflict() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let result = store.create_attribute(5, &NewAttribute::new("grip", "wood"));
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_get_product_detail() {
        let (store, category) = store_with_category();
        let created = store
            .create_product(&NewProduct::new("Hammer", category.id).with_attribute("a", "1"))
            .unwrap();

        let detail = store.get_product_detail(created.product.id).unwrap().unwrap();
        assert_eq!(detail, created);
        assert!(store.get_product_detail(999).unwrap().is_none());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("rapidstock.db");

        {
            let store = SqliteRecordStore::new(&path).unwrap();
            store.create_category(&NewCategory::new("Tools")).unwrap();
            assert_eq!(store.db_path(), Some(path.as_path()));
        }

        let reopened = SqliteRecordStore::new(&path).unwrap();
        assert_eq!(reopened.list_categories().unwrap().len(), 1);
    }
}
