use serde::{Deserialize, Serialize};

use super::{ClinicalEntity, lenient};
use crate::counter::CounterName;
use crate::id::AllocatedId;
use crate::time::Timestamp;

/// Parent visit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient::allocated_id")]
    pub record_id: AllocatedId,
    pub pet_id: String,
    pub vet_id: String,
    pub visit_date: Timestamp,
    pub diagnosis: String,
    pub treatment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    #[serde(rename = "updatedAt")]
    pub updated_at: Timestamp,
}

impl ClinicalEntity for Record {
    const ENTITY: &'static str = "Record";
    const COLLECTION: &'static str = "records";
    const COUNTER: CounterName = CounterName::Record;
    const ID_FIELD: &'static str = "RecordId";
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["PetId", "VetId", "VisitDate", "Diagnosis", "Treatment"];
    const MUTABLE_FIELDS: &'static [&'static str] = &[
        "PetId",
        "VetId",
        "VisitDate",
        "Diagnosis",
        "Treatment",
        "Notes",
    ];

    fn storage_id(&self) -> &str {
        &self.id
    }

    fn allocated_id(&self) -> AllocatedId {
        self.record_id
    }
}
