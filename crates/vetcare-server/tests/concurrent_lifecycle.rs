//! Record deletes racing child creates and report reads.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;
use vetcare_core::{LabResult, Prescription, ResourceRef};
use vetcare_db_memory::InMemoryStorage;
use vetcare_server::report::EMPTY_SECTION_PLACEHOLDER;
use vetcare_server::{LifecycleError, RecordLifecycleManager, ReportAssembler};
use vetcare_storage::{
    CascadeIntent, Document, DocumentStore, FieldFilter, IntentJournal, SequenceStore,
    StorageError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Insert,
    Find,
    Delete,
}

/// Parks the first matching storage call until released.
#[derive(Default)]
struct Gate {
    reached: Notify,
    release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.reached.notify_one();
        self.release.notified().await;
    }
}

/// In-memory storage with one-shot gates on selected calls.
#[derive(Default)]
struct GatedStorage {
    inner: InMemoryStorage,
    gates: Mutex<Vec<(Op, &'static str, Arc<Gate>)>>,
}

impl GatedStorage {
    fn gate(&self, op: Op, collection: &'static str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates
            .lock()
            .unwrap()
            .push((op, collection, gate.clone()));
        gate
    }

    async fn wait_at(&self, op: Op, collection: &str) {
        let gate = {
            let mut gates = self.gates.lock().unwrap();
            gates
                .iter()
                .position(|(o, c, _)| *o == op && *c == collection)
                .map(|i| gates.remove(i).2)
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }
    }
}

#[async_trait]
impl SequenceStore for GatedStorage {
    async fn next_value(&self, name: &str) -> Result<u64, StorageError> {
        self.inner.next_value(name).await
    }

    async fn current_value(&self, name: &str) -> Result<Option<u64>, StorageError> {
        self.inner.current_value(name).await
    }
}

#[async_trait]
impl DocumentStore for GatedStorage {
    async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<(), StorageError> {
        self.inner.ensure_unique_index(collection, field).await
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<Document, StorageError> {
        self.wait_at(Op::Insert, collection).await;
        self.inner.insert(collection, document).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        self.inner.get(collection, id).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Option<Document>, StorageError> {
        self.inner.find_one(collection, filter).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<Document>, StorageError> {
        self.wait_at(Op::Find, collection).await;
        self.inner.find(collection, filter).await
    }

    async fn replace(&self, collection: &str, document: Document) -> Result<Document, StorageError> {
        self.inner.replace(collection, document).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        self.wait_at(Op::Delete, collection).await;
        self.inner.delete(collection, id).await
    }

    async fn delete_many(&self, collection: &str, filter: &FieldFilter) -> Result<u64, StorageError> {
        self.inner.delete_many(collection, filter).await
    }

    fn backend_name(&self) -> &'static str {
        "gated"
    }
}

#[async_trait]
impl IntentJournal for GatedStorage {
    async fn record_intent(&self, intent: CascadeIntent) -> Result<(), StorageError> {
        self.inner.record_intent(intent).await
    }

    async fn clear_intent(&self, intent_id: &str) -> Result<(), StorageError> {
        self.inner.clear_intent(intent_id).await
    }

    async fn pending_intents(&self) -> Result<Vec<CascadeIntent>, StorageError> {
        self.inner.pending_intents().await
    }
}

async fn setup() -> (Arc<GatedStorage>, Arc<RecordLifecycleManager>) {
    let storage = Arc::new(GatedStorage::default());
    let manager = RecordLifecycleManager::new(storage.clone());
    manager.stores().ensure_indexes().await.unwrap();
    manager
        .create(&json!({
            "PetId": "pet-5",
            "VetId": "vet-9",
            "VisitDate": "2024-08-01",
            "Diagnosis": "Gastritis",
            "Treatment": "Bland diet",
        }))
        .await
        .unwrap();
    (storage, Arc::new(manager))
}

fn prescription() -> Value {
    json!({"RecordId": 1, "Medication": "Famotidine", "Dosage": "10mg", "Duration": "5 days"})
}

#[tokio::test]
async fn child_written_after_parent_delete_is_removed() {
    let (storage, manager) = setup().await;
    let gate = storage.gate(Op::Insert, "prescriptions");

    let creating = tokio::spawn({
        let manager = manager.clone();
        async move { manager.create_child::<Prescription>(&prescription()).await }
    });
    gate.reached.notified().await;

    // parent check already passed; the record and its (empty) children go first
    let deleted = manager
        .delete_record_and_children(&ResourceRef::parse("1"))
        .await
        .unwrap();
    assert_eq!(deleted.cascade.total(), 0);

    gate.release.notify_one();
    match creating.await.unwrap() {
        Err(LifecycleError::Validation { fields, .. }) => assert_eq!(fields, vec!["RecordId"]),
        other => panic!("expected missing parent, got {other:?}"),
    }
    assert!(
        manager
            .stores()
            .prescriptions
            .list_by_record(1)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(storage.pending_intents().await.unwrap().is_empty());
}

#[tokio::test]
async fn child_written_during_cascade_is_swept_with_parent() {
    let (storage, manager) = setup().await;
    let gate = storage.gate(Op::Delete, "records");

    let deleting = tokio::spawn({
        let manager = manager.clone();
        async move {
            manager
                .delete_record_and_children(&ResourceRef::parse("1"))
                .await
        }
    });
    // first pass is done, the parent row is about to go
    gate.reached.notified().await;

    let child: Prescription = manager.create_child(&prescription()).await.unwrap();
    assert_eq!(child.record_id, 1);

    gate.release.notify_one();
    let deleted = deleting.await.unwrap().unwrap();
    assert_eq!(deleted.cascade.prescriptions_deleted, 1);
    assert!(
        manager
            .stores()
            .prescriptions
            .list_by_record(1)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn report_tolerates_concurrent_cascade() {
    let (storage, manager) = setup().await;
    manager
        .create_child::<Prescription>(&prescription())
        .await
        .unwrap();
    for test_type in ["CBC", "Chem panel"] {
        manager
            .create_child::<LabResult>(&json!({"RecordId": 1, "TestType": test_type}))
            .await
            .unwrap();
    }

    let gate = storage.gate(Op::Find, "labresults");
    let reports = ReportAssembler::new(manager.stores().clone(), None);
    let building = tokio::spawn(async move {
        reports.build_report(&ResourceRef::parse("1"), None).await
    });
    gate.reached.notified().await;

    let deleted = manager
        .delete_record_and_children(&ResourceRef::parse("1"))
        .await
        .unwrap();
    assert_eq!(deleted.cascade.lab_results_deleted, 2);

    gate.release.notify_one();
    let report = building.await.unwrap().expect("report renders a partial view");
    assert_eq!(report.record_id, 1);

    // each section shows what existed when it was read, or the placeholder
    let prescriptions = &report.prescriptions;
    assert!(prescriptions.is_placeholder() || prescriptions.lines.len() == 1);
    assert!(report.vaccinations.is_placeholder());
    assert!(report.lab_results.is_placeholder());
    assert_eq!(report.lab_results.lines[0].text, EMPTY_SECTION_PLACEHOLDER);

    let pdf = vetcare_server::report::pdf::render(&report).unwrap();
    assert_eq!(&pdf[0..4], b"%PDF");
}
