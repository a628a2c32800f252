//! System-of-record trait.
//!
//! The record store is the authoritative source of truth for products,
//! categories, and attributes. It owns referential integrity: every rule in
//! the table below is enforced here, before anything reaches the search index.
//!
//! | Rule | Rejection |
//! |------|-----------|
//! | Product must reference an existing category | `Error::Conflict` |
//! | Category cannot be deleted while referenced | `Error::Conflict` |
//! | Attribute must reference an existing product | `Error::Conflict` |
//! | Deleting a product deletes its attributes | cascade |
//! | Unknown id on get/update/delete | `Error::NotFound` |

use crate::Result;
use crate::models::{
    Attribute, Category, NewAttribute, NewCategory, NewProduct, Product, ProductDetail,
    ProductReplacement,
};

/// Trait for system-of-record backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn RecordStore>`
/// - Multi-row writes (product + attributes) must be a single transaction
/// - Return values reflect the committed rows, including assigned ids
pub trait RecordStore: Send + Sync {
    /// Lists every product, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_products(&self) -> Result<Vec<Product>>;

    /// Retrieves a product by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_product(&self, id: i64) -> Result<Option<Product>>;

    /// Creates a product and its attributes in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the category does not exist.
    fn create_product(&self, input: &NewProduct) -> Result<ProductDetail>;

    /// Updates a product and replaces its attribute set.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown product and `Conflict` if the new
    /// category does not exist.
    fn update_product(&self, id: i64, input: &NewProduct) -> Result<ProductReplacement>;

    /// Deletes a product and, by cascade, its attributes.
    ///
    /// Returns the ids of the attributes removed with it, read before the delete.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown product.
    fn delete_product(&self, id: i64) -> Result<Vec<i64>>;

    /// Lists every category, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_categories(&self) -> Result<Vec<Category>>;

    /// Retrieves a category by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_category(&self, id: i64) -> Result<Option<Category>>;

    /// Creates a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn create_category(&self, input: &NewCategory) -> Result<Category>;

    /// Updates a category.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown category.
    fn update_category(&self, id: i64, input: &NewCategory) -> Result<Category>;

    /// Deletes a category.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown category and `Conflict` while any
    /// product still references it.
    fn delete_category(&self, id: i64) -> Result<()>;

    /// Lists every attribute, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_attributes(&self) -> Result<Vec<Attribute>>;

    /// Lists the attributes owned by a product, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn attributes_for_product(&self, product_id: i64) -> Result<Vec<Attribute>>;

    /// Creates an attribute on an existing product.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the product does not exist.
    fn create_attribute(&self, product_id: i64, input: &NewAttribute) -> Result<Attribute>;

    /// Updates an attribute's name and value.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown attribute.
    fn update_attribute(&self, id: i64, input: &NewAttribute) -> Result<Attribute>;

    /// Deletes an attribute.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown attribute.
    fn delete_attribute(&self, id: i64) -> Result<()>;

    /// Retrieves a product together with its attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if either query fails.
    fn get_product_detail(&self, id: i64) -> Result<Option<ProductDetail>> {
        let Some(product) = self.get_product(id)? else {
            return Ok(None);
        };
        let attributes = self.attributes_for_product(id)?;
        Ok(Some(ProductDetail {
            product,
            attributes,
        }))
    }
}
