//! Typed persistence for clinical entities over the document store.

use std::marker::PhantomData;

use serde_json::Value;
use vetcare_core::clinical::RECORD_ID_FIELD;
use vetcare_core::{
    AllocatedId, ClinicalEntity, LabResult, Prescription, Record, ResourceRef, Vaccination,
    apply_update, build_entity, generate_storage_id, ignored_update_fields, now_utc, validate_new,
};
use vetcare_storage::{Document, DocumentStore, DynStorage, FieldFilter, StorageError};

use crate::allocator::SequenceAllocator;
use crate::error::LifecycleError;

/// Store for one clinical entity type.
///
/// New entities get their allocated id from the [`SequenceAllocator`]
/// before they are written. The allocated id field carries a unique index,
/// so a colliding id is rejected by storage rather than silently
/// duplicated.
pub struct ClinicalEntityStore<E> {
    storage: DynStorage,
    allocator: SequenceAllocator,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for ClinicalEntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            allocator: self.allocator.clone(),
            _entity: PhantomData,
        }
    }
}

fn decode<E: ClinicalEntity>(document: Document) -> Result<E, LifecycleError> {
    serde_json::from_value(document.into_value()).map_err(|e| {
        StorageError::internal(format!("stored {} is unreadable: {e}", E::ENTITY)).into()
    })
}

fn encode<E: ClinicalEntity>(entity: &E) -> Result<Document, LifecycleError> {
    let body = serde_json::to_value(entity).map_err(StorageError::from)?;
    Ok(Document::from_value(body)?)
}

impl<E: ClinicalEntity> ClinicalEntityStore<E> {
    pub fn new(storage: DynStorage, allocator: SequenceAllocator) -> Self {
        Self {
            storage,
            allocator,
            _entity: PhantomData,
        }
    }

    /// Declares the unique index on the allocated id field.
    pub async fn ensure_indexes(&self) -> Result<(), LifecycleError> {
        self.storage
            .ensure_unique_index(E::COLLECTION, E::ID_FIELD)
            .await?;
        Ok(())
    }

    /// Validates `payload`, allocates an id and persists the new entity.
    ///
    /// Validation runs before allocation so rejected payloads do not spend
    /// sequence values.
    pub async fn create(&self, payload: &Value) -> Result<E, LifecycleError> {
        validate_new::<E>(payload)?;
        let allocated = self.allocator.next_value(E::COUNTER).await?;
        let entity = build_entity::<E>(payload, &generate_storage_id(), allocated, now_utc())?;
        self.insert(entity).await
    }

    async fn insert(&self, entity: E) -> Result<E, LifecycleError> {
        let document = encode(&entity)?;
        match self.storage.insert(E::COLLECTION, document).await {
            Ok(_) => {
                tracing::info!(
                    entity = E::ENTITY,
                    id = entity.allocated_id(),
                    storage_id = %entity.storage_id(),
                    "created"
                );
                Ok(entity)
            }
            Err(StorageError::AlreadyExists { key, .. }) => {
                tracing::error!(
                    entity = E::ENTITY,
                    id = entity.allocated_id(),
                    key = %key,
                    "allocated id collided with an existing document"
                );
                Err(LifecycleError::duplicate_id(E::ENTITY, entity.allocated_id()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, storage_id: &str) -> Result<Option<E>, LifecycleError> {
        match self.storage.get(E::COLLECTION, storage_id).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_allocated_id(&self, id: AllocatedId) -> Result<Option<E>, LifecycleError> {
        let filter = FieldFilter::eq(E::ID_FIELD, id);
        match self.storage.find_one(E::COLLECTION, &filter).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    /// Looks the entity up by storage identity first, then by allocated id.
    pub async fn resolve(&self, reference: &ResourceRef) -> Result<Option<E>, LifecycleError> {
        if let Some(found) = self.get(reference.storage_id()).await? {
            return Ok(Some(found));
        }
        match reference.allocated_id() {
            Some(id) => self.find_by_allocated_id(id).await,
            None => Ok(None),
        }
    }

    /// Like [`resolve`](Self::resolve) but a miss is a `NotFound` error.
    pub async fn require(&self, reference: &ResourceRef) -> Result<E, LifecycleError> {
        self.resolve(reference)
            .await?
            .ok_or_else(|| LifecycleError::not_found(E::ENTITY, reference.to_string()))
    }

    /// Lists entities ordered by allocated id, optionally only those of one record.
    pub async fn list(&self, record_id: Option<AllocatedId>) -> Result<Vec<E>, LifecycleError> {
        let filter = record_id.map(|id| FieldFilter::eq(RECORD_ID_FIELD, id));
        let documents = self.storage.find(E::COLLECTION, filter.as_ref()).await?;
        let mut entities = documents
            .into_iter()
            .map(decode::<E>)
            .collect::<Result<Vec<_>, _>>()?;
        entities.sort_by_key(|e| e.allocated_id());
        Ok(entities)
    }

    pub async fn list_by_record(&self, record_id: AllocatedId) -> Result<Vec<E>, LifecycleError> {
        self.list(Some(record_id)).await
    }

    /// Applies a whitelisted partial update.
    pub async fn update(&self, reference: &ResourceRef, patch: &Value) -> Result<E, LifecycleError> {
        let current = self.require(reference).await?;
        let ignored = ignored_update_fields::<E>(patch);
        if !ignored.is_empty() {
            tracing::debug!(
                entity = E::ENTITY,
                id = current.allocated_id(),
                ?ignored,
                "ignoring immutable fields in update"
            );
        }
        let updated = apply_update(&current, patch, now_utc())?;
        match self.storage.replace(E::COLLECTION, encode(&updated)?).await {
            Ok(_) => Ok(updated),
            // deleted between read and write
            Err(StorageError::NotFound { .. }) => {
                Err(LifecycleError::not_found(E::ENTITY, reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Removes one entity. A missing entity is not an error.
    ///
    /// Records must go through the lifecycle manager instead so their
    /// children are removed first.
    pub(crate) async fn delete(&self, reference: &ResourceRef) -> Result<Option<E>, LifecycleError> {
        let Some(entity) = self.resolve(reference).await? else {
            return Ok(None);
        };
        self.delete_by_storage_id(entity.storage_id()).await?;
        Ok(Some(entity))
    }

    pub(crate) async fn delete_by_storage_id(&self, storage_id: &str) -> Result<bool, LifecycleError> {
        let removed = self.storage.delete(E::COLLECTION, storage_id).await?;
        if removed.is_some() {
            tracing::info!(entity = E::ENTITY, storage_id, "deleted");
        }
        Ok(removed.is_some())
    }

    /// Deletes every entity referencing `record_id` and returns how many this call removed.
    pub(crate) async fn delete_by_record(&self, record_id: AllocatedId) -> Result<u64, StorageError> {
        self.storage
            .delete_many(E::COLLECTION, &FieldFilter::eq(RECORD_ID_FIELD, record_id))
            .await
    }
}

/// All entity stores sharing one backend and allocator.
#[derive(Clone)]
pub struct EntityStores {
    pub allocator: SequenceAllocator,
    pub records: ClinicalEntityStore<Record>,
    pub prescriptions: ClinicalEntityStore<Prescription>,
    pub vaccinations: ClinicalEntityStore<Vaccination>,
    pub lab_results: ClinicalEntityStore<LabResult>,
}

impl EntityStores {
    pub fn new(storage: DynStorage) -> Self {
        let allocator = SequenceAllocator::new(storage.clone());
        Self {
            records: ClinicalEntityStore::new(storage.clone(), allocator.clone()),
            prescriptions: ClinicalEntityStore::new(storage.clone(), allocator.clone()),
            vaccinations: ClinicalEntityStore::new(storage.clone(), allocator.clone()),
            lab_results: ClinicalEntityStore::new(storage, allocator.clone()),
            allocator,
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), LifecycleError> {
        self.records.ensure_indexes().await?;
        self.prescriptions.ensure_indexes().await?;
        self.vaccinations.ensure_indexes().await?;
        self.lab_results.ensure_indexes().await
    }
}

/// Entities that hang off a parent visit record.
pub trait ChildEntity: ClinicalEntity {
    fn store(stores: &EntityStores) -> &ClinicalEntityStore<Self>;
}

impl ChildEntity for Prescription {
    fn store(stores: &EntityStores) -> &ClinicalEntityStore<Self> {
        &stores.prescriptions
    }
}

impl ChildEntity for Vaccination {
    fn store(stores: &EntityStores) -> &ClinicalEntityStore<Self> {
        &stores.vaccinations
    }
}

impl ChildEntity for LabResult {
    fn store(stores: &EntityStores) -> &ClinicalEntityStore<Self> {
        &stores.lab_results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use vetcare_db_memory::InMemoryStorage;

    async fn stores() -> EntityStores {
        let stores = EntityStores::new(Arc::new(InMemoryStorage::new()));
        stores.ensure_indexes().await.unwrap();
        stores
    }

    fn record_payload() -> Value {
        json!({
            "PetId": "pet-1",
            "VetId": "vet-1",
            "VisitDate": "2024-03-01",
            "Diagnosis": "Otitis",
            "Treatment": "Ear drops",
        })
    }

    #[tokio::test]
    async fn test_create_allocates_sequential_ids() {
        let stores = stores().await;
        let first = stores.records.create(&record_payload()).await.unwrap();
        let second = stores.records.create(&record_payload()).await.unwrap();
        assert_eq!(first.record_id, 1);
        assert_eq!(second.record_id, 2);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_invalid_payload_does_not_spend_ids() {
        let stores = stores().await;
        let err = stores.records.create(&json!({"PetId": "p"})).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));

        let created = stores.records.create(&record_payload()).await.unwrap();
        assert_eq!(created.record_id, 1);
    }

    #[tokio::test]
    async fn test_client_supplied_id_is_rejected() {
        let stores = stores().await;
        let mut payload = record_payload();
        payload["RecordId"] = json!(42);
        let err = stores.records.create(&payload).await.unwrap_err();
        match err {
            LifecycleError::Validation { fields, .. } => assert_eq!(fields, vec!["RecordId"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_by_storage_or_allocated_id() {
        let stores = stores().await;
        let created = stores.records.create(&record_payload()).await.unwrap();

        let by_storage = stores
            .records
            .resolve(&ResourceRef::parse(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(by_storage.as_ref(), Some(&created));

        let by_allocated = stores.records.resolve(&ResourceRef::parse("1")).await.unwrap();
        assert_eq!(by_allocated, Some(created));

        assert!(stores.records.resolve(&ResourceRef::parse("99")).await.unwrap().is_none());
        let err = stores.records.require(&ResourceRef::parse("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_colliding_allocated_id_is_duplicate_error() {
        let storage = Arc::new(InMemoryStorage::new());
        let stores = EntityStores::new(storage.clone());
        stores.ensure_indexes().await.unwrap();

        stores.records.create(&record_payload()).await.unwrap();
        // Occupy the next id so the following create collides.
        let squatter = json!({
            "_id": "squatter",
            "RecordId": 2,
            "PetId": "p",
            "VetId": "v",
            "VisitDate": "2024-01-01T00:00:00Z",
            "Diagnosis": "d",
            "Treatment": "t",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
        });
        storage
            .insert("records", Document::from_value(squatter).unwrap())
            .await
            .unwrap();

        let err = stores.records.create(&record_payload()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateId { entity: "Record", .. }));
    }

    #[tokio::test]
    async fn test_update_whitelists_fields() {
        let stores = stores().await;
        let created = stores.records.create(&record_payload()).await.unwrap();
        let updated = stores
            .records
            .update(
                &ResourceRef::parse(created.id.clone()),
                &json!({"Diagnosis": "Resolved", "RecordId": 77, "_id": "hijack"}),
            )
            .await
            .unwrap();
        assert_eq!(updated.diagnosis, "Resolved");
        assert_eq!(updated.record_id, created.record_id);
        assert_eq!(updated.id, created.id);

        let err = stores
            .records
            .update(&ResourceRef::parse("404"), &json!({"Diagnosis": "x"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_record_and_delete_by_record() {
        let stores = stores().await;
        for record_id in [1, 1, 2] {
            stores
                .prescriptions
                .create(&json!({
                    "RecordId": record_id,
                    "Medication": "Amoxicillin",
                    "Dosage": "50mg",
                    "Duration": "7 days",
                }))
                .await
                .unwrap();
        }
        let of_one = stores.prescriptions.list_by_record(1).await.unwrap();
        assert_eq!(of_one.len(), 2);
        assert!(of_one[0].prescription_id < of_one[1].prescription_id);

        assert_eq!(stores.prescriptions.delete_by_record(1).await.unwrap(), 2);
        assert_eq!(stores.prescriptions.delete_by_record(1).await.unwrap(), 0);
        assert_eq!(stores.prescriptions.list(None).await.unwrap().len(), 1);
    }
}
