//! Create, update and delete orchestration for visit records.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;
use vetcare_core::clinical::RECORD_ID_FIELD;
use vetcare_core::{AllocatedId, ClinicalEntity, Record, ResourceRef, parse_allocated_id};
use vetcare_storage::{CascadeIntent, DynStorage, IntentJournal};

use crate::cascade::{CascadeDeleteCoordinator, CascadeStats};
use crate::entity_store::{ChildEntity, EntityStores};
use crate::error::LifecycleError;

/// Result of a successful record delete.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedRecord {
    pub record: Record,
    pub cascade: CascadeStats,
}

/// Outcome of replaying pending cascade intents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub replayed: usize,
    pub failed: usize,
}

/// Owns the record lifecycle.
///
/// [`delete_record_and_children`](Self::delete_record_and_children) is the
/// only path that removes records. Storage has no delete hooks, so the
/// cascade runs exactly once per call.
pub struct RecordLifecycleManager {
    storage: DynStorage,
    stores: EntityStores,
    cascade: CascadeDeleteCoordinator,
}

impl RecordLifecycleManager {
    pub fn new(storage: DynStorage) -> Self {
        let stores = EntityStores::new(storage.clone());
        let cascade = CascadeDeleteCoordinator::new(stores.clone());
        Self {
            storage,
            stores,
            cascade,
        }
    }

    pub fn stores(&self) -> &EntityStores {
        &self.stores
    }

    pub fn cascade(&self) -> &CascadeDeleteCoordinator {
        &self.cascade
    }

    pub async fn create(&self, payload: &Value) -> Result<Record, LifecycleError> {
        self.stores.records.create(payload).await
    }

    /// `RecordId` and `_id` in the patch are ignored.
    pub async fn update(
        &self,
        reference: &ResourceRef,
        patch: &Value,
    ) -> Result<Record, LifecycleError> {
        self.stores.records.update(reference, patch).await
    }

    /// Creates a child entity under an existing record.
    ///
    /// The parent is checked again once the child is written. A record
    /// deleted in between takes the new child with it: the child is removed
    /// and the create fails as if the parent had never existed.
    pub async fn create_child<E: ChildEntity>(&self, payload: &Value) -> Result<E, LifecycleError> {
        vetcare_core::validate_new::<E>(payload)?;
        let record_id = parent_reference(payload)
            .ok_or_else(|| LifecycleError::validation([RECORD_ID_FIELD]))?;
        if !self.parent_exists(record_id).await? {
            return Err(missing_parent(record_id));
        }

        let store = E::store(&self.stores);
        let child = store.create(payload).await?;
        if self.parent_exists(record_id).await? {
            return Ok(child);
        }

        tracing::warn!(
            entity = E::ENTITY,
            id = child.allocated_id(),
            record_id,
            "parent record deleted during child create; removing child"
        );
        store.delete_by_storage_id(child.storage_id()).await?;
        Err(missing_parent(record_id))
    }

    async fn parent_exists(&self, record_id: AllocatedId) -> Result<bool, LifecycleError> {
        Ok(self
            .stores
            .records
            .find_by_allocated_id(record_id)
            .await?
            .is_some())
    }

    /// Deletes a record after removing all of its children.
    ///
    /// An intent is journaled first and cleared only once the parent row is
    /// gone, so an interrupted delete is replayed by
    /// [`reconcile_pending`](Self::reconcile_pending). A record that cannot
    /// be resolved yields `NotFound` without any write.
    ///
    /// Children are swept a second time after the parent row is removed, so
    /// a child whose create passed the parent check while the first pass ran
    /// is still removed; the returned stats include both passes.
    pub async fn delete_record_and_children(
        &self,
        reference: &ResourceRef,
    ) -> Result<DeletedRecord, LifecycleError> {
        let record = self.stores.records.require(reference).await?;

        let intent = CascadeIntent {
            intent_id: Uuid::new_v4().to_string(),
            record_storage_id: record.id.clone(),
            record_id: record.record_id,
            created_at: time::OffsetDateTime::now_utc(),
        };
        self.storage.record_intent(intent.clone()).await?;

        let mut cascade = self
            .cascade
            .delete_all_children_of(record.record_id)
            .await
            .inspect_err(|_| {
                tracing::warn!(
                    record_id = record.record_id,
                    intent_id = %intent.intent_id,
                    "record kept; cascade intent left pending for reconciliation"
                );
            })?;

        self.stores.records.delete_by_storage_id(&record.id).await?;
        cascade += self.sweep(record.record_id, &intent).await?;

        if let Err(e) = self.storage.clear_intent(&intent.intent_id).await {
            tracing::warn!(
                intent_id = %intent.intent_id,
                record_id = record.record_id,
                error = %e,
                "record deleted but cascade intent could not be cleared"
            );
        }

        tracing::info!(
            record_id = record.record_id,
            children_deleted = cascade.total(),
            "record deleted"
        );
        Ok(DeletedRecord { record, cascade })
    }

    /// Replays every journaled delete that never completed.
    ///
    /// Each replay removes remaining children, then the parent if it still
    /// exists, then clears the intent. Intents whose replay fails stay
    /// pending for the next run.
    pub async fn reconcile_pending(&self) -> Result<ReconcileSummary, LifecycleError> {
        let pending = self.storage.pending_intents().await?;
        let mut summary = ReconcileSummary::default();
        for intent in pending {
            match self.replay(&intent).await {
                Ok(stats) => {
                    summary.replayed += 1;
                    tracing::info!(
                        intent_id = %intent.intent_id,
                        record_id = intent.record_id,
                        children_deleted = stats.total(),
                        "replayed interrupted record delete"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        intent_id = %intent.intent_id,
                        record_id = intent.record_id,
                        error = %e,
                        "could not replay interrupted record delete"
                    );
                }
            }
        }
        Ok(summary)
    }

    async fn replay(&self, intent: &CascadeIntent) -> Result<CascadeStats, LifecycleError> {
        let mut stats = self.cascade.delete_all_children_of(intent.record_id).await?;
        self.stores
            .records
            .delete_by_storage_id(&intent.record_storage_id)
            .await?;
        stats += self.sweep(intent.record_id, intent).await?;
        self.storage.clear_intent(&intent.intent_id).await?;
        Ok(stats)
    }

    /// Second cascade pass, run once the parent row is gone.
    async fn sweep(
        &self,
        record_id: AllocatedId,
        intent: &CascadeIntent,
    ) -> Result<CascadeStats, LifecycleError> {
        let stats = self
            .cascade
            .delete_all_children_of(record_id)
            .await
            .inspect_err(|_| {
                tracing::warn!(
                    record_id,
                    intent_id = %intent.intent_id,
                    "record removed but child sweep failed; cascade intent left pending"
                );
            })?;
        if stats.total() > 0 {
            tracing::info!(
                record_id,
                children_deleted = stats.total(),
                "swept children created during record delete"
            );
        }
        Ok(stats)
    }
}

fn missing_parent(record_id: AllocatedId) -> LifecycleError {
    LifecycleError::Validation {
        fields: vec![RECORD_ID_FIELD.to_string()],
        message: format!("{} {record_id} does not exist", Record::ENTITY),
    }
}

/// Parent `RecordId` from a child payload, read like the stored document reads it.
fn parent_reference(payload: &Value) -> Option<AllocatedId> {
    payload
        .get(RECORD_ID_FIELD)
        .and_then(parse_allocated_id)
        .filter(|id| *id > 0)
}
