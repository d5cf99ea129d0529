pub mod clinical;
pub mod counter;
pub mod error;
pub mod id;
pub mod time;

pub use clinical::{
    ClinicalEntity, LabResult, Prescription, Record, Vaccination, apply_update, build_entity,
    ignored_update_fields, parse_allocated_id, validate_new,
};
pub use counter::{Counter, CounterName};
pub use error::{CoreError, ErrorCategory, Result};
pub use id::{AllocatedId, ResourceRef, generate_storage_id};
pub use crate::time::{Timestamp, now_utc};
