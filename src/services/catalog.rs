//! Catalog write path.
//!
//! Every operation commits to the record store first. A rejected write returns
//! its error before any propagation is attempted; a committed write is then
//! propagated and reported as successful regardless of the index outcome.

use crate::models::{
    Attribute, Category, EntityKind, NewAttribute, NewCategory, NewProduct, Product, ProductDetail,
};
use crate::services::IndexSyncService;
use crate::storage::traits::RecordStore;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

/// Write and read operations over the catalog.
pub struct CatalogService {
    records: Arc<dyn RecordStore>,
    sync: Arc<IndexSyncService>,
}

impl CatalogService {
    /// Creates a catalog service.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, sync: Arc<IndexSyncService>) -> Self {
        Self { records, sync }
    }

    /// Returns the sync service.
    #[must_use]
    pub const fn sync(&self) -> &Arc<IndexSyncService> {
        &self.sync
    }

    /// Creates a product with its attributes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` or `Conflict` if the record store rejects the write.
    #[instrument(skip(self, input), fields(operation = "create_product"))]
    pub fn create_product(&self, input: &NewProduct) -> Result<ProductDetail> {
        let detail = self.records.create_product(input)?;
        self.sync
            .on_product_created(&detail.product, &detail.attributes);
        Ok(detail)
    }

    /// Replaces a product and its attribute set.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `InvalidInput`, or `Conflict` if the write is rejected.
    #[instrument(skip(self, input), fields(operation = "update_product"))]
    pub fn update_product(&self, id: i64, input: &NewProduct) -> Result<ProductDetail> {
        let replacement = self.records.update_product(id, input)?;
        self.sync.on_product_updated(
            &replacement.detail.product,
            &replacement.detail.attributes,
            &replacement.replaced_attribute_ids,
        );
        Ok(replacement.detail)
    }

    /// Deletes a product and its attributes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist.
    #[instrument(skip(self), fields(operation = "delete_product"))]
    pub fn delete_product(&self, id: i64) -> Result<()> {
        let attribute_ids = self.records.delete_product(id)?;
        self.sync.on_product_deleted(id, &attribute_ids);
        Ok(())
    }

    /// Lists products.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store query fails.
    pub fn list_products(&self) -> Result<Vec<Product>> {
        self.records.list_products()
    }

    /// Returns a product with its attributes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist.
    pub fn get_product(&self, id: i64) -> Result<ProductDetail> {
        self.records
            .get_product_detail(id)?
            .ok_or(Error::NotFound {
                kind: EntityKind::Product,
                id,
            })
    }

    /// Creates a category.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the name is blank.
    #[instrument(skip(self, input), fields(operation = "create_category"))]
    pub fn create_category(&self, input: &NewCategory) -> Result<Category> {
        let category = self.records.create_category(input)?;
        self.sync.on_category_created(&category);
        Ok(category)
    }

    /// Updates a category.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidInput` if the write is rejected.
    #[instrument(skip(self, input), fields(operation = "update_category"))]
    pub fn update_category(&self, id: i64, input: &NewCategory) -> Result<Category> {
        let category = self.records.update_category(id, input)?;
        self.sync.on_category_updated(&category);
        Ok(category)
    }

    /// Deletes an unreferenced category.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, or `Conflict` while products reference the category.
    #[instrument(skip(self), fields(operation = "delete_category"))]
    pub fn delete_category(&self, id: i64) -> Result<()> {
        self.records.delete_category(id)?;
        self.sync.on_category_deleted(id);
        Ok(())
    }

    /// Lists categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store query fails.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.records.list_categories()
    }

    /// Adds an attribute to a product.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the product does not exist.
    #[instrument(skip(self, input), fields(operation = "create_attribute"))]
    pub fn create_attribute(&self, product_id: i64, input: &NewAttribute) -> Result<Attribute> {
        let attribute = self.records.create_attribute(product_id, input)?;
        self.sync.on_attribute_created(&attribute);
        Ok(attribute)
    }

    /// Updates an attribute.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidInput` if the write is rejected.
    #[instrument(skip(self, input), fields(operation = "update_attribute"))]
    pub fn update_attribute(&self, id: i64, input: &NewAttribute) -> Result<Attribute> {
        let attribute = self.records.update_attribute(id, input)?;
        self.sync.on_attribute_updated(&attribute);
        Ok(attribute)
    }

    /// Deletes an attribute.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the attribute does not exist.
    #[instrument(skip(self), fields(operation = "delete_attribute"))]
    pub fn delete_attribute(&self, id: i64) -> Result<()> {
        self.records.delete_attribute(id)?;
        self.sync.on_attribute_deleted(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionNames;
    use crate::storage::{InMemorySearchBackend, SqliteRecordStore};

    fn catalog() -> (CatalogService, Arc<InMemorySearchBackend>) {
        let records: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let index = Arc::new(InMemorySearchBackend::new());
        let sync = Arc::new(IndexSyncService::new(
            Arc::clone(&records),
            index.clone(),
            CollectionNames::default(),
        ));
        sync.startup_resync().unwrap();
        (CatalogService::new(records, sync), index)
    }

    #[test]
    fn test_writes_propagate_to_index() {
        let (catalog, index) = catalog();
        let category = catalog.create_category(&NewCategory::new("Tools")).unwrap();
        let detail = catalog
            .create_product(&NewProduct::new("Hammer", category.id).with_attribute("w", "1kg"))
            .unwrap();

        assert!(index.document("categories", category.id).is_some());
        assert!(index.document("products", detail.product.id).is_some());
        assert_eq!(index.documents("attributes").len(), 1);

        let renamed = catalog
            .update_category(category.id, &NewCategory::new("Hand Tools"))
            .unwrap();
        let doc = index.document("categories", renamed.id).unwrap();
        assert_eq!(doc.get_str("name"), Some("Hand Tools"));
    }

    #[test]
    fn test_rejected_write_does_not_propagate() {
        let (catalog, index) = catalog();
        let result = catalog.create_product(&NewProduct::new("Orphan", 77));
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert!(index.documents("products").is_empty());

        let category = catalog.create_category(&NewCategory::new("Tools")).unwrap();
        catalog
            .create_product(&NewProduct::new("Hammer", category.id))
            .unwrap();
        assert!(matches!(
            catalog.delete_category(category.id),
            Err(Error::Conflict(_))
        ));
        assert!(index.document("categories", category.id).is_some());
    }

    #[test]
    fn test_attribute_operations_propagate() {
        let (catalog, index) = catalog();
        let category = catalog.create_category(&NewCategory::new("Tools")).unwrap();
        let product = catalog
            .create_product(&NewProduct::new("Hammer", category.id))
            .unwrap()
            .product;

        let attr = catalog
            .create_attribute(product.id, &NewAttribute::new("grip", "rubber"))
            .unwrap();
        catalog
            .update_attribute(attr.id, &NewAttribute::new("grip", "wood"))
            .unwrap();
        assert_eq!(
            index.document("attributes", attr.id).unwrap().get_str("value"),
            Some("wood")
        );

        catalog.delete_attribute(attr.id).unwrap();
        assert!(index.document("attributes", attr.id).is_none());
    }

    #[test]
    fn test_get_missing_product_is_not_found() {
        let (catalog, _index) = catalog();
        assert!(matches!(
            catalog.get_product(5),
            Err(Error::NotFound {
                kind: EntityKind::Product,
                id: 5
            })
        ));
    }
}
