//! Entity kinds mirrored into the search index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three record kinds held by the system of record.
///
/// Each kind maps to exactly one search collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Catalog products.
    Product,
    /// Product categories.
    Category,
    /// Name/value attributes attached to a product.
    Attribute,
}

impl EntityKind {
    /// Returns all kinds in resync order.
    ///
    /// The order is fixed so resync logs and reports are reproducible.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Product, Self::Category, Self::Attribute]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Category => "category",
            Self::Attribute => "attribute",
        }
    }

    /// Returns the plural form, used for default collection and table names.
    #[must_use]
    pub const fn plural(&self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Category => "categories",
            Self::Attribute => "attributes",
        }
    }

    /// Parses a kind from its singular or plural name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "product" | "products" => Some(Self::Product),
            "category" | "categories" => Some(Self::Category),
            "attribute" | "attributes" => Some(Self::Attribute),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
