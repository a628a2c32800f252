//! Product attribute records.

use super::{Document, EntityKind, Indexable};
use serde::{Deserialize, Serialize};

/// A name/value attribute owned by a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Identifier assigned by the system of record.
    pub id: i64,
    /// Attribute name (e.g. `color`).
    pub name: String,
    /// Attribute value (e.g. `red`).
    pub value: String,
    /// Owning product.
    pub product_id: i64,
}

/// Input for creating or updating an attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

impl NewAttribute {
    /// Creates an attribute input.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parses a `name=value` pair.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if there is no `=` or the name is blank.
    pub fn parse_pair(pair: &str) -> crate::Result<Self> {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            crate::Error::InvalidInput(format!("attribute '{pair}' must be name=value"))
        })?;
        let attribute = Self::new(name.trim(), value.trim());
        attribute.validate()?;
        Ok(attribute)
    }

    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the name is blank.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "attribute name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Indexable for Attribute {
    const KIND: EntityKind = EntityKind::Attribute;

    fn index_id(&self) -> i64 {
        self.id
    }

    fn to_document(&self) -> Document {
        Document::new()
            .with_field("id", self.id)
            .with_field("name", self.name.clone())
            .with_field("value", self.value.clone())
            .with_field("product_id", self.product_id)
    }
}
