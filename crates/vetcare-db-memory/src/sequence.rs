//! Implementation of the SequenceStore trait for InMemoryStorage.

use async_trait::async_trait;
use vetcare_storage::{SequenceStore, StorageError};

use crate::storage::InMemoryStorage;

#[async_trait]
impl SequenceStore for InMemoryStorage {
    async fn next_value(&self, name: &str) -> Result<u64, StorageError> {
        if name.is_empty() {
            return Err(StorageError::invalid_document("counter name must not be empty"));
        }
        // update_or_insert is a single compare-and-swap on the counter slot,
        // so concurrent callers each get their own value.
        let seq = *self
            .counters
            .pin()
            .update_or_insert(name.to_string(), |seq| seq + 1, 1);
        Ok(seq)
    }

    async fn current_value(&self, name: &str) -> Result<Option<u64>, StorageError> {
        Ok(self.counters.pin().get(name).copied())
    }
}
