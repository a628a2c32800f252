//! Category records.

use super::{Document, EntityKind, Indexable};
use serde::{Deserialize, Serialize};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identifier assigned by the system of record.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
}

/// Input for creating or updating a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

impl NewCategory {
    /// Creates a category input with no description.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the name is blank.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "category name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Indexable for Category {
    const KIND: EntityKind = EntityKind::Category;

    fn index_id(&self) -> i64 {
        self.id
    }

    fn to_document(&self) -> Document {
        Document::new()
            .with_field("id", self.id)
            .with_field("name", self.name.clone())
            .with_field("description", self.description.clone())
    }
}
