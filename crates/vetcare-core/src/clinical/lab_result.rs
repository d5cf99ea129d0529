use serde::{Deserialize, Serialize};

use super::{ClinicalEntity, lenient, validate_cost};
use crate::counter::CounterName;
use crate::error::Result;
use crate::id::AllocatedId;
use crate::time::Timestamp;

/// Laboratory result, optionally backed by an uploaded file.
///
/// `FileUrl` is whatever the upload service returned; it is usually a
/// relative storage path and gets resolved to an absolute URL when a report
/// is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LabResult {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient::allocated_id")]
    pub lab_result_id: AllocatedId,
    #[serde(deserialize_with = "lenient::allocated_id")]
    pub record_id: AllocatedId,
    pub test_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_date: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub cost: f64,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    #[serde(rename = "updatedAt")]
    pub updated_at: Timestamp,
}

impl ClinicalEntity for LabResult {
    const ENTITY: &'static str = "LabResult";
    const COLLECTION: &'static str = "labresults";
    const COUNTER: CounterName = CounterName::LabResult;
    const ID_FIELD: &'static str = "LabResultId";
    const REQUIRED_FIELDS: &'static [&'static str] = &["RecordId", "TestType"];
    const MUTABLE_FIELDS: &'static [&'static str] =
        &["TestType", "TestDate", "Result", "FileUrl", "Cost"];
    const CREATE_ONLY_FIELDS: &'static [&'static str] = &["RecordId"];

    fn storage_id(&self) -> &str {
        &self.id
    }

    fn allocated_id(&self) -> AllocatedId {
        self.lab_result_id
    }

    fn parent_record_id(&self) -> Option<AllocatedId> {
        Some(self.record_id)
    }

    fn validate(&self) -> Result<()> {
        validate_cost(self.cost)
    }
}
