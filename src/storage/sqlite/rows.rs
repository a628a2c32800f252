//! Row conversion for catalog tables.

use crate::models::{Attribute, Category, Product};
use rusqlite::Row;

/// Column list matching [`product_from_row`].
pub const PRODUCT_COLUMNS: &str = "id, name, description, category_id";

/// Column list matching [`category_from_row`].
pub const CATEGORY_COLUMNS: &str = "id, name, description";

/// Column list matching [`attribute_from_row`].
pub const ATTRIBUTE_COLUMNS: &str = "id, name, value, product_id";

/// Builds a [`Product`] from a row selected with [`PRODUCT_COLUMNS`].
///
/// # Errors
///
/// Returns an error if a column has an unexpected type.
pub fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category_id: row.get(3)?,
    })
}

/// Builds a [`Category`] from a row selected with [`CATEGORY_COLUMNS`].
///
/// # Errors
///
/// Returns an error if a column has an unexpected type.
pub fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

/// Builds an [`Attribute`] from a row selected with [`ATTRIBUTE_COLUMNS`].
///
/// # Errors
///
/// Returns an error if a column has an unexpected type.
pub fn attribute_from_row(row: &Row<'_>) -> rusqlite::Result<Attribute> {
    Ok(Attribute {
        id: row.get(0)?,
        name: row.get(1)?,
        value: row.get(2)?,
        product_id: row.get(3)?,
    })
}
