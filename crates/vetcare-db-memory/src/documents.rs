//! Implementation of the DocumentStore trait for InMemoryStorage.

use async_trait::async_trait;
use vetcare_storage::{Document, DocumentStore, FieldFilter, StorageError};

use crate::storage::{InMemoryStorage, collection_prefix, make_document_key, make_index_key};

#[async_trait]
impl DocumentStore for InMemoryStorage {
    async fn ensure_unique_index(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<(), StorageError> {
        self.unique_fields.pin().update_or_insert(
            collection.to_string(),
            |fields| {
                let mut fields = fields.clone();
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.to_string());
                }
                fields
            },
            vec![field.to_string()],
        );
        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<Document, StorageError> {
        let key = make_document_key(collection, &document.id);
        let index = self.unique_index.pin();

        // Claim unique values first; give them back if anything conflicts.
        let mut claimed = Vec::new();
        for field in self.unique_fields_of(collection) {
            let Some(value) = document.field(&field).filter(|v| !v.is_null()) else {
                continue;
            };
            let index_key = make_index_key(collection, &field, value);
            if index.try_insert(index_key.clone(), document.id.clone()).is_err() {
                for k in &claimed {
                    index.remove(k);
                }
                return Err(StorageError::already_exists(
                    collection,
                    format!("{field}={value}"),
                ));
            }
            claimed.push(index_key);
        }

        let documents = self.documents.pin();
        if documents.try_insert(key, document.body.clone()).is_err() {
            for k in &claimed {
                index.remove(k);
            }
            return Err(StorageError::already_exists(
                collection,
                format!("_id={}", document.id),
            ));
        }

        Ok(document)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        let key = make_document_key(collection, id);
        let body = self.documents.pin().get(&key).cloned();
        body.map(Document::from_value).transpose()
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Option<Document>, StorageError> {
        let prefix = collection_prefix(collection);
        let body = self
            .documents
            .pin()
            .iter()
            .find(|(key, body)| key.starts_with(&prefix) && filter.matches(body))
            .map(|(_, body)| body.clone());
        body.map(Document::from_value).transpose()
    }

    async fn find(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<Document>, StorageError> {
        let prefix = collection_prefix(collection);
        let bodies: Vec<_> = self
            .documents
            .pin()
            .iter()
            .filter(|(key, body)| {
                key.starts_with(&prefix) && filter.is_none_or(|f| f.matches(body))
            })
            .map(|(_, body)| body.clone())
            .collect();
        bodies.into_iter().map(Document::from_value).collect()
    }

    async fn replace(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<Document, StorageError> {
        let key = make_document_key(collection, &document.id);
        let documents = self.documents.pin();

        let existing = documents
            .get(&key)
            .ok_or_else(|| StorageError::not_found(collection, &document.id))?;
        for field in self.unique_fields_of(collection) {
            if existing.get(&field) != document.field(&field) {
                return Err(StorageError::invalid_document(format!(
                    "unique field {field} cannot change on {collection}/{}",
                    document.id
                )));
            }
        }

        let body = document.body.clone();
        documents
            .update(key, move |_| body.clone())
            .ok_or_else(|| StorageError::not_found(collection, &document.id))?;

        Ok(document)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        let key = make_document_key(collection, id);
        let removed = self.documents.pin().remove(&key).cloned();
        if let Some(body) = &removed {
            self.release_index_entries(collection, body);
        }
        removed.map(Document::from_value).transpose()
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<u64, StorageError> {
        let prefix = collection_prefix(collection);
        let documents = self.documents.pin();

        let matching: Vec<String> = documents
            .iter()
            .filter(|(key, body)| key.starts_with(&prefix) && filter.matches(body))
            .map(|(key, _)| key.clone())
            .collect();

        // Only rows this call actually removed are counted; a concurrent
        // caller that got there first owns the others.
        let mut removed = 0;
        for key in matching {
            if let Some(body) = documents.remove(&key) {
                self.release_index_entries(collection, body);
                removed += 1;
            }
        }

        tracing::trace!(collection, field = %filter.field, removed, "delete_many");
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
