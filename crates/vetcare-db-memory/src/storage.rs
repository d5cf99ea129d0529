use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use std::sync::Arc;
use vetcare_storage::CascadeIntent;

/// Document map key. Format: "collection/id".
pub type StorageKey = String;

pub(crate) fn make_document_key(collection: &str, id: &str) -> StorageKey {
    format!("{collection}/{id}")
}

pub(crate) fn collection_prefix(collection: &str) -> String {
    format!("{collection}/")
}

pub(crate) fn make_index_key(collection: &str, field: &str, value: &Value) -> StorageKey {
    format!("{collection}/{field}={value}")
}

/// In-memory storage backend using papaya lock-free HashMaps.
///
/// This storage implementation provides:
/// - Lock-free concurrent access via papaya::HashMap
/// - Atomic create-if-absent counter increments
/// - Unique secondary indexes claimed with `try_insert`
/// - An intent journal for interrupted cascade deletes
///
/// Clones share the same underlying maps.
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    /// Document bodies keyed by "collection/id"
    pub(crate) documents: Arc<PapayaHashMap<StorageKey, Value>>,
    /// Unique fields declared per collection
    pub(crate) unique_fields: Arc<PapayaHashMap<String, Vec<String>>>,
    /// Claimed unique values: "collection/field=value" -> document id
    pub(crate) unique_index: Arc<PapayaHashMap<StorageKey, String>>,
    /// Counter rows: name -> last issued value
    pub(crate) counters: Arc<PapayaHashMap<String, u64>>,
    /// Pending cascade intents keyed by intent id
    pub(crate) intents: Arc<PapayaHashMap<String, CascadeIntent>>,
}

impl InMemoryStorage {
    /// Creates a new, empty in-memory storage.
    pub fn new() -> Self {
        Self {
            documents: Arc::new(PapayaHashMap::new()),
            unique_fields: Arc::new(PapayaHashMap::new()),
            unique_index: Arc::new(PapayaHashMap::new()),
            counters: Arc::new(PapayaHashMap::new()),
            intents: Arc::new(PapayaHashMap::new()),
        }
    }

    /// Total number of stored documents across all collections.
    pub fn count(&self) -> usize {
        self.documents.pin().len()
    }

    /// Number of documents in one collection.
    pub fn count_in(&self, collection: &str) -> usize {
        let prefix = collection_prefix(collection);
        self.documents
            .pin()
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .count()
    }

    pub(crate) fn unique_fields_of(&self, collection: &str) -> Vec<String> {
        self.unique_fields
            .pin()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Releases the unique index entries held by a removed document body.
    pub(crate) fn release_index_entries(&self, collection: &str, body: &Value) {
        let index = self.unique_index.pin();
        for field in self.unique_fields_of(collection) {
            if let Some(value) = body.get(&field).filter(|v| !v.is_null()) {
                index.remove(&make_index_key(collection, &field, value));
            }
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::task::JoinSet;
    use vetcare_storage::{
        DocumentStore, FieldFilter, IntentJournal, SequenceStore, Document, StorageError,
    };

    fn child(id: &str, allocated: u64, record_id: u64) -> Document {
        Document::from_value(json!({
            "_id": id,
            "PrescriptionId": allocated,
            "RecordId": record_id,
        }))
        .unwrap()
    }

    #[test]
    fn test_make_keys() {
        assert_eq!(make_document_key("records", "abc"), "records/abc");
        assert_eq!(
            make_index_key("records", "RecordId", &json!(7)),
            "records/RecordId=7"
        );
        assert_eq!(collection_prefix("records"), "records/");
    }

    #[tokio::test]
    async fn test_storage_basic_operations() {
        let storage = InMemoryStorage::new();
        let doc = child("p-1", 1, 10);

        storage.insert("prescriptions", doc.clone()).await.unwrap();
        assert_eq!(storage.count(), 1);
        assert_eq!(storage.count_in("prescriptions"), 1);
        assert_eq!(storage.count_in("records"), 0);

        let fetched = storage.get("prescriptions", "p-1").await.unwrap();
        assert_eq!(fetched, Some(doc.clone()));

        let mut updated = doc.clone();
        updated.body["Dosage"] = json!("5mg");
        storage.replace("prescriptions", updated).await.unwrap();
        let fetched = storage.get("prescriptions", "p-1").await.unwrap().unwrap();
        assert_eq!(fetched.body["Dosage"], "5mg");

        let deleted = storage.delete("prescriptions", "p-1").await.unwrap();
        assert!(deleted.is_some());
        assert_eq!(storage.count(), 0);
    }

    #[tokio::test]
    async fn test_storage_conflicts_and_not_found() {
        let storage = InMemoryStorage::new();
        storage.insert("prescriptions", child("p-1", 1, 10)).await.unwrap();

        let conflict = storage.insert("prescriptions", child("p-1", 2, 10)).await;
        assert!(matches!(conflict, Err(StorageError::AlreadyExists { .. })));

        let missing = storage.replace("prescriptions", child("nope", 3, 10)).await;
        assert!(matches!(missing, Err(StorageError::NotFound { .. })));

        // Deleting a missing document is a no-op
        let deleted = storage.delete("prescriptions", "nope").await.unwrap();
        assert!(deleted.is_none());
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicate_allocated_id() {
        let storage = InMemoryStorage::new();
        storage
            .ensure_unique_index("prescriptions", "PrescriptionId")
            .await
            .unwrap();
        storage
            .ensure_unique_index("prescriptions", "PrescriptionId")
            .await
            .unwrap();

        storage.insert("prescriptions", child("p-1", 1, 10)).await.unwrap();
        let dup = storage.insert("prescriptions", child("p-2", 1, 10)).await;
        match dup {
            Err(StorageError::AlreadyExists { key, .. }) => assert_eq!(key, "PrescriptionId=1"),
            other => panic!("expected duplicate key, got {other:?}"),
        }
        assert_eq!(storage.count_in("prescriptions"), 1);

        // Unique values can change hands only once the holder is gone
        storage.delete("prescriptions", "p-1").await.unwrap();
        storage.insert("prescriptions", child("p-2", 1, 10)).await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_cannot_change_unique_field() {
        let storage = InMemoryStorage::new();
        storage
            .ensure_unique_index("prescriptions", "PrescriptionId")
            .await
            .unwrap();
        storage.insert("prescriptions", child("p-1", 1, 10)).await.unwrap();

        let result = storage.replace("prescriptions", child("p-1", 99, 10)).await;
        assert!(matches!(result, Err(StorageError::InvalidDocument { .. })));
    }

    #[tokio::test]
    async fn test_find_and_delete_many_by_field() {
        let storage = InMemoryStorage::new();
        for (i, record) in [(1, 10), (2, 10), (3, 11)] {
            storage
                .insert("prescriptions", child(&format!("p-{i}"), i, record))
                .await
                .unwrap();
        }
        storage
            .insert("records", Document::from_value(json!({"_id": "r", "RecordId": 10})).unwrap())
            .await
            .unwrap();

        let filter = FieldFilter::eq("RecordId", 10u64);
        assert_eq!(storage.find("prescriptions", Some(&filter)).await.unwrap().len(), 2);
        assert_eq!(storage.find("prescriptions", None).await.unwrap().len(), 3);
        assert!(storage.find_one("prescriptions", &filter).await.unwrap().is_some());

        assert_eq!(storage.delete_many("prescriptions", &filter).await.unwrap(), 2);
        assert_eq!(storage.delete_many("prescriptions", &filter).await.unwrap(), 0);
        assert_eq!(storage.count_in("prescriptions"), 1);
        // Other collections are untouched
        assert_eq!(storage.count_in("records"), 1);
    }

    #[tokio::test]
    async fn test_next_value_creates_counter_lazily() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.current_value("record").await.unwrap(), None);
        assert_eq!(storage.next_value("record").await.unwrap(), 1);
        assert_eq!(storage.next_value("record").await.unwrap(), 2);
        assert_eq!(storage.next_value("prescription").await.unwrap(), 1);
        assert_eq!(storage.current_value("record").await.unwrap(), Some(2));
        assert!(storage.next_value("").await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_next_value_is_contiguous() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.next_value("labresult").await.unwrap();
        let prior = storage.current_value("labresult").await.unwrap().unwrap();

        let mut join_set = JoinSet::new();
        for _ in 0..200 {
            let storage = Arc::clone(&storage);
            join_set.spawn(async move { storage.next_value("labresult").await });
        }

        let mut values = Vec::new();
        while let Some(result) = join_set.join_next().await {
            values.push(result.unwrap().unwrap());
        }
        values.sort_unstable();
        let expected: Vec<u64> = (prior + 1..=prior + 200).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn test_concurrent_delete_many_counts_each_row_once() {
        let storage = Arc::new(InMemoryStorage::new());
        for i in 0..100 {
            storage
                .insert("vaccinations", child(&format!("v-{i}"), i, 5))
                .await
                .unwrap();
        }

        let mut join_set = JoinSet::new();
        for _ in 0..8 {
            let storage = Arc::clone(&storage);
            join_set.spawn(async move {
                storage
                    .delete_many("vaccinations", &FieldFilter::eq("RecordId", 5u64))
                    .await
            });
        }

        let mut total = 0;
        while let Some(result) = join_set.join_next().await {
            total += result.unwrap().unwrap();
        }
        assert_eq!(total, 100);
        assert_eq!(storage.count_in("vaccinations"), 0);
    }

    #[tokio::test]
    async fn test_intent_journal_lifecycle() {
        use time::OffsetDateTime;
        use vetcare_storage::CascadeIntent;

        let storage = InMemoryStorage::new();
        let older = CascadeIntent {
            intent_id: "i-1".into(),
            record_storage_id: "r-1".into(),
            record_id: 1,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let newer = CascadeIntent {
            intent_id: "i-2".into(),
            record_storage_id: "r-2".into(),
            record_id: 2,
            created_at: OffsetDateTime::now_utc(),
        };
        storage.record_intent(newer.clone()).await.unwrap();
        storage.record_intent(older.clone()).await.unwrap();
        assert!(storage.record_intent(older.clone()).await.is_err());

        assert_eq!(
            storage.pending_intents().await.unwrap(),
            vec![older.clone(), newer.clone()]
        );

        storage.clear_intent("i-1").await.unwrap();
        storage.clear_intent("i-1").await.unwrap();
        assert_eq!(storage.pending_intents().await.unwrap(), vec![newer]);
    }
}
