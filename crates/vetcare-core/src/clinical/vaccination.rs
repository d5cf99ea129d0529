use serde::{Deserialize, Serialize};

use super::{ClinicalEntity, lenient, validate_cost};
use crate::counter::CounterName;
use crate::error::{CoreError, Result};
use crate::id::AllocatedId;
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vaccination {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient::allocated_id")]
    pub vaccination_id: AllocatedId,
    #[serde(deserialize_with = "lenient::allocated_id")]
    pub record_id: AllocatedId,
    pub vaccine_name: String,
    pub date_administered: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub cost: f64,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    #[serde(rename = "updatedAt")]
    pub updated_at: Timestamp,
}

impl ClinicalEntity for Vaccination {
    const ENTITY: &'static str = "Vaccination";
    const COLLECTION: &'static str = "vaccinations";
    const COUNTER: CounterName = CounterName::Vaccination;
    const ID_FIELD: &'static str = "VaccinationId";
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["RecordId", "VaccineName", "DateAdministered"];
    const MUTABLE_FIELDS: &'static [&'static str] = &[
        "VaccineName",
        "DateAdministered",
        "NextDueDate",
        "BatchNumber",
        "Cost",
    ];
    const CREATE_ONLY_FIELDS: &'static [&'static str] = &["RecordId"];

    fn storage_id(&self) -> &str {
        &self.id
    }

    fn allocated_id(&self) -> AllocatedId {
        self.vaccination_id
    }

    fn parent_record_id(&self) -> Option<AllocatedId> {
        Some(self.record_id)
    }

    fn validate(&self) -> Result<()> {
        validate_cost(self.cost)?;
        match self.next_due_date {
            Some(due) if due < self.date_administered => {
                Err(CoreError::validation(["NextDueDate"]))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinical::build_entity;
    use serde_json::json;

    #[test]
    fn test_next_due_date_must_follow_administration() {
        let payload = json!({
            "RecordId": 1,
            "VaccineName": "DHPP",
            "DateAdministered": "2024-05-01",
            "NextDueDate": "2024-04-01"
        });
        let err = build_entity::<Vaccination>(&payload, "v", 1, crate::now_utc()).unwrap_err();
        assert_eq!(err.fields(), vec!["NextDueDate".to_string()]);
    }

    #[test]
    fn test_negative_cost_is_rejected() {
        let payload = json!({
            "RecordId": 1,
            "VaccineName": "DHPP",
            "DateAdministered": "2024-05-01",
            "Cost": -5
        });
        let err = build_entity::<Vaccination>(&payload, "v", 1, crate::now_utc()).unwrap_err();
        assert_eq!(err.fields(), vec!["Cost".to_string()]);
    }
}
