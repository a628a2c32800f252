//! Product records.

use super::{Attribute, Document, EntityKind, Indexable, NewAttribute};
use serde::{Deserialize, Serialize};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Identifier assigned by the system of record.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Category this product belongs to.
    pub category_id: i64,
}

/// Input for creating or updating a product together with its attributes.
///
/// On update the attribute list replaces the product's existing attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Category this product belongs to.
    pub category_id: i64,
    /// Attributes written alongside the product.
    #[serde(default)]
    pub attributes: Vec<NewAttribute>,
}

impl NewProduct {
    /// Creates a product input with no description and no attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, category_id: i64) -> Self {
        Self {
            name: name.into(),
            description: None,
            category_id,
            attributes: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(NewAttribute::new(name, value));
        self
    }

    /// Validates the product and every attribute.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the name or any attribute name is blank.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "product name must not be empty".to_string(),
            ));
        }
        self.attributes.iter().try_for_each(NewAttribute::validate)
    }
}

/// A product together with its committed attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    /// The product row.
    pub product: Product,
    /// Attribute rows owned by the product.
    pub attributes: Vec<Attribute>,
}

/// Outcome of replacing a product and its attribute set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReplacement {
    /// The product and its new attributes.
    pub detail: ProductDetail,
    /// Ids of the attribute rows removed by the replacement.
    pub replaced_attribute_ids: Vec<i64>,
}

impl Indexable for Product {
    const KIND: EntityKind = EntityKind::Product;

    fn index_id(&self) -> i64 {
        self.id
    }

    fn to_document(&self) -> Document {
        Document::new()
            .with_field("id", self.id)
            .with_field("name", self.name.clone())
            .with_field("description", self.description.clone())
            .with_field("category_id", self.category_id)
    }
}
