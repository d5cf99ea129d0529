//! Storage traits for the storage abstraction layer.
//!
//! Backends implement all three traits and get [`Storage`] for free.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{CascadeIntent, Document, FieldFilter};

/// Named monotonically increasing counters.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Atomically increments the named counter and returns the new value,
    /// creating the counter at zero first if it does not exist.
    ///
    /// The read-modify-write must be indivisible at the storage layer: two
    /// concurrent calls for the same name never observe the same value.
    /// Values are never handed out twice, even after the documents that
    /// used them are deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the increment could not be applied. Callers must
    /// not fall back to a default id in that case.
    async fn next_value(&self, name: &str) -> Result<u64, StorageError>;

    /// Returns the last value issued for the counter, or `None` if the
    /// counter has never been used.
    async fn current_value(&self, name: &str) -> Result<Option<u64>, StorageError>;
}

/// JSON document collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Declares `field` as unique within `collection`.
    ///
    /// Subsequent inserts carrying an already indexed value fail with
    /// `StorageError::AlreadyExists`. Idempotent.
    async fn ensure_unique_index(&self, collection: &str, field: &str)
        -> Result<(), StorageError>;

    /// Inserts a new document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the identity or any uniquely
    /// indexed field value is already present.
    async fn insert(&self, collection: &str, document: Document)
        -> Result<Document, StorageError>;

    /// Reads a document by storage identity.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError>;

    /// Returns the first document matching the filter.
    async fn find_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Option<Document>, StorageError>;

    /// Returns all documents of a collection, optionally filtered.
    ///
    /// Ordering is unspecified.
    async fn find(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<Document>, StorageError>;

    /// Replaces an existing document with the same identity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist and
    /// `StorageError::InvalidDocument` if a uniquely indexed field changed.
    async fn replace(&self, collection: &str, document: Document)
        -> Result<Document, StorageError>;

    /// Deletes a document by identity, returning it if it existed.
    ///
    /// Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError>;

    /// Deletes every document matching the filter and returns how many
    /// documents this call removed.
    ///
    /// Concurrent calls with overlapping filters each count only the
    /// documents they removed themselves.
    async fn delete_many(&self, collection: &str, filter: &FieldFilter)
        -> Result<u64, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Compensating-action log for multi-collection deletes.
#[async_trait]
pub trait IntentJournal: Send + Sync {
    /// Durably records an intent before any row is removed.
    async fn record_intent(&self, intent: CascadeIntent) -> Result<(), StorageError>;

    /// Clears a completed intent. Clearing an unknown intent is not an error.
    async fn clear_intent(&self, intent_id: &str) -> Result<(), StorageError>;

    /// Returns intents that were recorded but never cleared, oldest first.
    async fn pending_intents(&self) -> Result<Vec<CascadeIntent>, StorageError>;
}

/// Everything a backend provides.
pub trait Storage: SequenceStore + DocumentStore + IntentJournal {}

impl<T> Storage for T where T: SequenceStore + DocumentStore + IntentJournal {}
