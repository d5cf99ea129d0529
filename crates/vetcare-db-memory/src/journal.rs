//! Implementation of the IntentJournal trait for InMemoryStorage.

use async_trait::async_trait;
use vetcare_storage::{CascadeIntent, IntentJournal, StorageError};

use crate::storage::InMemoryStorage;

#[async_trait]
impl IntentJournal for InMemoryStorage {
    async fn record_intent(&self, intent: CascadeIntent) -> Result<(), StorageError> {
        let intent_id = intent.intent_id.clone();
        self.intents
            .pin()
            .try_insert(intent_id.clone(), intent)
            .map(|_| ())
            .map_err(|_| StorageError::already_exists("intents", format!("_id={intent_id}")))
    }

    async fn clear_intent(&self, intent_id: &str) -> Result<(), StorageError> {
        self.intents.pin().remove(intent_id);
        Ok(())
    }

    async fn pending_intents(&self) -> Result<Vec<CascadeIntent>, StorageError> {
        let mut pending: Vec<CascadeIntent> =
            self.intents.pin().iter().map(|(_, i)| i.clone()).collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.intent_id.cmp(&b.intent_id))
        });
        Ok(pending)
    }
}
