//! Removal of every child entity that references a visit record.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use vetcare_core::{AllocatedId, ClinicalEntity, LabResult, Prescription, Vaccination};
use vetcare_storage::StorageError;

use crate::entity_store::EntityStores;
use crate::error::{CollectionFailure, LifecycleError};

/// Rows removed per child collection by one cascade call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeStats {
    pub prescriptions_deleted: u64,
    pub vaccinations_deleted: u64,
    pub lab_results_deleted: u64,
}

impl CascadeStats {
    pub fn total(&self) -> u64 {
        self.prescriptions_deleted + self.vaccinations_deleted + self.lab_results_deleted
    }
}

impl AddAssign for CascadeStats {
    fn add_assign(&mut self, other: Self) {
        self.prescriptions_deleted += other.prescriptions_deleted;
        self.vaccinations_deleted += other.vaccinations_deleted;
        self.lab_results_deleted += other.lab_results_deleted;
    }
}

/// Deletes the children of a record across the three child collections.
///
/// Never touches the parent. Safe to call any number of times for the same
/// record, concurrently or not: each call reports only the rows it removed.
#[derive(Clone)]
pub struct CascadeDeleteCoordinator {
    stores: EntityStores,
}

impl CascadeDeleteCoordinator {
    pub fn new(stores: EntityStores) -> Self {
        Self { stores }
    }

    /// Runs the three child deletions concurrently and aggregates the counts.
    ///
    /// If any collection fails the others still run to completion and their
    /// deletions stand; the error carries what was removed.
    pub async fn delete_all_children_of(
        &self,
        record_id: AllocatedId,
    ) -> Result<CascadeStats, LifecycleError> {
        let (prescriptions, vaccinations, lab_results) = tokio::join!(
            self.stores.prescriptions.delete_by_record(record_id),
            self.stores.vaccinations.delete_by_record(record_id),
            self.stores.lab_results.delete_by_record(record_id),
        );

        let mut stats = CascadeStats::default();
        let mut failures = Vec::new();
        tally(
            prescriptions,
            Prescription::COLLECTION,
            &mut stats.prescriptions_deleted,
            &mut failures,
        );
        tally(
            vaccinations,
            Vaccination::COLLECTION,
            &mut stats.vaccinations_deleted,
            &mut failures,
        );
        tally(
            lab_results,
            LabResult::COLLECTION,
            &mut stats.lab_results_deleted,
            &mut failures,
        );

        if failures.is_empty() {
            tracing::info!(
                record_id,
                prescriptions_deleted = stats.prescriptions_deleted,
                vaccinations_deleted = stats.vaccinations_deleted,
                lab_results_deleted = stats.lab_results_deleted,
                "cascade delete completed"
            );
            return Ok(stats);
        }

        for failure in &failures {
            tracing::error!(
                record_id,
                collection = failure.collection,
                error = %failure.message,
                prescriptions_deleted = stats.prescriptions_deleted,
                vaccinations_deleted = stats.vaccinations_deleted,
                lab_results_deleted = stats.lab_results_deleted,
                "cascade delete failed; completed deletions are not rolled back"
            );
        }
        Err(LifecycleError::CascadeFailure {
            record_id,
            failures,
            partial: stats,
        })
    }
}

fn tally(
    result: Result<u64, StorageError>,
    collection: &'static str,
    slot: &mut u64,
    failures: &mut Vec<CollectionFailure>,
) {
    match result {
        Ok(removed) => *slot = removed,
        Err(e) => failures.push(CollectionFailure {
            collection,
            message: e.to_string(),
        }),
    }
}
