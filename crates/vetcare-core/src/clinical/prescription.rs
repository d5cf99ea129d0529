use serde::{Deserialize, Serialize};

use super::{ClinicalEntity, lenient, validate_cost};
use crate::counter::CounterName;
use crate::error::Result;
use crate::id::AllocatedId;
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Prescription {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient::allocated_id")]
    pub prescription_id: AllocatedId,
    #[serde(deserialize_with = "lenient::allocated_id")]
    pub record_id: AllocatedId,
    pub medication: String,
    pub dosage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub cost: f64,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    #[serde(rename = "updatedAt")]
    pub updated_at: Timestamp,
}

impl ClinicalEntity for Prescription {
    const ENTITY: &'static str = "Prescription";
    const COLLECTION: &'static str = "prescriptions";
    const COUNTER: CounterName = CounterName::Prescription;
    const ID_FIELD: &'static str = "PrescriptionId";
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["RecordId", "Medication", "Dosage", "Duration"];
    const MUTABLE_FIELDS: &'static [&'static str] = &[
        "Medication",
        "Dosage",
        "Frequency",
        "Duration",
        "Instructions",
        "Cost",
    ];
    const CREATE_ONLY_FIELDS: &'static [&'static str] = &["RecordId"];

    fn storage_id(&self) -> &str {
        &self.id
    }

    fn allocated_id(&self) -> AllocatedId {
        self.prescription_id
    }

    fn parent_record_id(&self) -> Option<AllocatedId> {
        Some(self.record_id)
    }

    fn validate(&self) -> Result<()> {
        validate_cost(self.cost)
    }
}
