//! Clinical entity types and the document rules shared by every entity store.
//!
//! Every entity is persisted as a JSON document carrying an opaque storage
//! identity (`_id`), an allocated sequential id (`RecordId`,
//! `PrescriptionId`, ...) and `createdAt` / `updatedAt` timestamps. Children
//! additionally carry a `RecordId` soft reference to their parent visit.
//!
//! The functions in this module turn client payloads into entities:
//! [`build_entity`] for creation (required-field check, client-supplied ids
//! rejected) and [`apply_update`] for partial updates (mutable-field
//! whitelist only).

mod lab_result;
mod prescription;
mod record;
mod vaccination;

pub use lab_result::LabResult;
pub use prescription::Prescription;
pub use record::Record;
pub use vaccination::Vaccination;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::counter::CounterName;
use crate::error::{CoreError, Result};
use crate::id::AllocatedId;
use crate::time::Timestamp;

/// Storage identity field present on every document.
pub const STORAGE_ID_FIELD: &str = "_id";
/// Soft reference from a child document to its parent visit record.
pub const RECORD_ID_FIELD: &str = "RecordId";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A persisted clinical document type.
pub trait ClinicalEntity:
    Serialize + DeserializeOwned + Clone + std::fmt::Debug + Send + Sync + 'static
{
    /// Entity name used in logs and error messages.
    const ENTITY: &'static str;
    /// Collection the documents live in.
    const COLLECTION: &'static str;
    /// Sequence counter that issues allocated ids for this entity.
    const COUNTER: CounterName;
    /// Field holding the allocated id.
    const ID_FIELD: &'static str;
    /// Fields that must be present and non-blank on create.
    const REQUIRED_FIELDS: &'static [&'static str];
    /// Fields that may be changed after creation.
    const MUTABLE_FIELDS: &'static [&'static str];
    /// Fields accepted on create only (never through an update).
    const CREATE_ONLY_FIELDS: &'static [&'static str] = &[];

    fn storage_id(&self) -> &str;

    fn allocated_id(&self) -> AllocatedId;

    /// Parent visit record for child entities.
    fn parent_record_id(&self) -> Option<AllocatedId> {
        None
    }

    /// Domain checks run after the document deserialized successfully.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| CoreError::invalid_document("request body must be a JSON object"))
}

fn from_document<E: ClinicalEntity>(document: Value) -> Result<E> {
    let entity: E = serde_json::from_value(document)
        .map_err(|e| CoreError::invalid_document(format!("{}: {e}", E::ENTITY)))?;
    entity.validate()?;
    Ok(entity)
}

/// Builds a new entity from a client payload.
///
/// The storage identity and allocated id are never taken from the payload;
/// supplying either is a [`CoreError::ForbiddenField`]. Unknown fields are
/// dropped.
pub fn build_entity<E: ClinicalEntity>(
    payload: &Value,
    storage_id: &str,
    allocated_id: AllocatedId,
    now: Timestamp,
) -> Result<E> {
    let obj = as_object(payload)?;

    for forbidden in [STORAGE_ID_FIELD, E::ID_FIELD] {
        if obj.contains_key(forbidden) {
            return Err(CoreError::forbidden_field(forbidden));
        }
    }

    let missing: Vec<&str> = E::REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| is_blank(obj.get(*field)))
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::validation(missing));
    }

    let mut document = Map::new();
    for (key, value) in obj {
        let accepted = E::MUTABLE_FIELDS.contains(&key.as_str())
            || E::CREATE_ONLY_FIELDS.contains(&key.as_str());
        if accepted && !value.is_null() {
            document.insert(key.clone(), value.clone());
        }
    }
    document.insert(STORAGE_ID_FIELD.into(), Value::String(storage_id.into()));
    document.insert(E::ID_FIELD.into(), Value::from(allocated_id));
    document.insert(CREATED_AT_FIELD.into(), Value::String(now.to_string()));
    document.insert(UPDATED_AT_FIELD.into(), Value::String(now.to_string()));

    from_document(Value::Object(document))
}

/// Checks a create payload without issuing an id.
///
/// Lets callers reject malformed input before a sequence value is spent.
pub fn validate_new<E: ClinicalEntity>(payload: &Value) -> Result<()> {
    build_entity::<E>(payload, "", 0, crate::time::now_utc()).map(|_| ())
}

/// Applies a partial update to an existing entity.
///
/// Only [`ClinicalEntity::MUTABLE_FIELDS`] are copied from the patch; the
/// storage identity, allocated id and parent reference are never touched.
/// Blanking a required field is a validation error.
pub fn apply_update<E: ClinicalEntity>(current: &E, patch: &Value, now: Timestamp) -> Result<E> {
    let obj = as_object(patch)?;

    let blanked: Vec<&str> = E::REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| {
            E::MUTABLE_FIELDS.contains(field) && obj.contains_key(*field) && is_blank(obj.get(*field))
        })
        .collect();
    if !blanked.is_empty() {
        return Err(CoreError::validation(blanked));
    }

    let mut document = serde_json::to_value(current)?;
    let fields = document
        .as_object_mut()
        .ok_or_else(|| CoreError::invalid_document("stored document is not an object"))?;
    for (key, value) in obj {
        if !E::MUTABLE_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if value.is_null() {
            fields.remove(key);
        } else {
            fields.insert(key.clone(), value.clone());
        }
    }
    fields.insert(UPDATED_AT_FIELD.into(), Value::String(now.to_string()));

    from_document(document)
}

/// Patch keys that an update will ignore.
pub fn ignored_update_fields<E: ClinicalEntity>(patch: &Value) -> Vec<String> {
    patch
        .as_object()
        .map(|obj| {
            obj.keys()
                .filter(|key| !E::MUTABLE_FIELDS.contains(&key.as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Reads an allocated id with the same rules entity documents use: integers,
/// whole-number floats and numeric strings.
pub fn parse_allocated_id(value: &Value) -> Option<AllocatedId> {
    lenient::allocated_id(value).ok()
}

/// Lenient numeric deserializers: HTML forms frequently submit numbers as strings.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Unsigned(u64),
        Float(f64),
        Text(String),
    }

    pub fn allocated_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Unsigned(n) => Ok(n),
            NumberOrString::Float(f) if f.fract() == 0.0 && f >= 0.0 => Ok(f as u64),
            NumberOrString::Float(f) => Err(serde::de::Error::custom(format!(
                "expected a whole number id, got {f}"
            ))),
            NumberOrString::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid id '{s}'"))),
        }
    }

    pub fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Unsigned(n) => Ok(n as f64),
            NumberOrString::Float(f) => Ok(f),
            NumberOrString::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid amount '{s}'"))),
        }
    }
}

pub(crate) fn validate_cost(cost: f64) -> Result<()> {
    if cost.is_finite() && cost >= 0.0 {
        Ok(())
    } else {
        Err(CoreError::validation(["Cost"]))
    }
}
