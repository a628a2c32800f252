//! Search documents and the projection from records into them.

use super::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the primary key field in every collection.
pub const PRIMARY_KEY: &str = "id";

/// A denormalized, per-entity projection pushed into the search index.
///
/// Documents are flat JSON objects keyed by field name. The `id` field is the
/// primary key inside a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Adds or replaces a field.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    /// Returns the primary key, if present and integral.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.0.get(PRIMARY_KEY).and_then(Value::as_i64)
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns a field as a string slice.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Returns all fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the document, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// A system-of-record row that has a search projection.
pub trait Indexable {
    /// The collection this row is mirrored into.
    const KIND: EntityKind;

    /// Primary key of the row.
    fn index_id(&self) -> i64;

    /// Projects the row into its search document.
    fn to_document(&self) -> Document;
}

/// Projects a slice of rows into documents, preserving order.
#[must_use]
pub fn project_all<T: Indexable>(rows: &[T]) -> Vec<Document> {
    rows.iter().map(Indexable::to_document).collect()
}
