//! Types shared by storage backends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StorageError;

/// Name of the storage identity field carried by every document.
pub const ID_FIELD: &str = "_id";

/// A stored JSON document.
///
/// The body always contains the `_id` field matching [`Document::id`].
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Storage identity.
    pub id: String,
    /// Full document body.
    pub body: Value,
}

impl Document {
    /// Wraps a JSON object, reading its identity from `_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidDocument` if the body is not an object or
    /// has no non-empty string `_id`.
    pub fn from_value(body: Value) -> Result<Self, StorageError> {
        if !body.is_object() {
            return Err(StorageError::invalid_document("document must be a JSON object"));
        }
        let id = body
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .ok_or_else(|| StorageError::invalid_document("document is missing _id"))?;
        Ok(Self { id, body })
    }

    /// Returns a top-level field of the body.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Consumes the document, returning its body.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.body
    }
}

/// Equality match on a single top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Field name.
    pub field: String,
    /// Expected value.
    pub value: Value,
}

impl FieldFilter {
    /// Creates a `field == value` filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns `true` if the document body satisfies this filter.
    ///
    /// Numbers compare by value, so `1` matches `1.0`.
    #[must_use]
    pub fn matches(&self, body: &Value) -> bool {
        match (body.get(&self.field), &self.value) {
            (Some(Value::Number(a)), Value::Number(b)) => match (a.as_u64(), b.as_u64()) {
                (Some(a), Some(b)) => a == b,
                _ => a.as_f64() == b.as_f64(),
            },
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        }
    }
}

/// A pending cascade delete recorded before any row is removed.
///
/// Cleared once the parent record is gone. Intents still present at startup
/// mark a delete that was interrupted and must be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeIntent {
    /// Unique intent identity.
    pub intent_id: String,
    /// Storage identity of the parent record.
    pub record_storage_id: String,
    /// Allocated id of the parent record; children reference this value.
    pub record_id: u64,
    /// When the intent was written.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_requires_id() {
        assert!(Document::from_value(json!({"a": 1})).is_err());
        assert!(Document::from_value(json!({"_id": ""})).is_err());
        assert!(Document::from_value(json!("str")).is_err());

        let doc = Document::from_value(json!({"_id": "x", "a": 1})).unwrap();
        assert_eq!(doc.id, "x");
        assert_eq!(doc.field("a"), Some(&json!(1)));
    }

    #[test]
    fn test_filter_matches_numbers_by_value() {
        let filter = FieldFilter::eq("RecordId", 3u64);
        assert!(filter.matches(&json!({"RecordId": 3})));
        assert!(filter.matches(&json!({"RecordId": 3.0})));
        assert!(!filter.matches(&json!({"RecordId": 4})));
        assert!(!filter.matches(&json!({"RecordId": "3"})));
        assert!(!filter.matches(&json!({"Other": 3})));
    }

    #[test]
    fn test_filter_matches_strings() {
        let filter = FieldFilter::eq("PetId", "pet-1");
        assert!(filter.matches(&json!({"PetId": "pet-1"})));
        assert!(!filter.matches(&json!({"PetId": "pet-2"})));
    }
}
