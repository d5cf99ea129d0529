//! Service-level errors for the record lifecycle and their HTTP mapping.

use axum::response::{IntoResponse, Response};
use thiserror::Error;
use vetcare_api::ApiError;
use vetcare_core::CoreError;
use vetcare_storage::{ErrorCategory, StorageError};

use crate::cascade::CascadeStats;

/// A child collection that could not be cleared during a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFailure {
    pub collection: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{message}")]
    Validation { fields: Vec<String>, message: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} id {id} is already in use")]
    DuplicateId { entity: &'static str, id: String },

    /// Some child deletions failed. Deletions that already happened stay
    /// deleted; `partial` counts them.
    #[error("cascade delete for record {record_id} failed in {}", failed_collections(.failures))]
    CascadeFailure {
        record_id: u64,
        failures: Vec<CollectionFailure>,
        partial: CascadeStats,
    },

    #[error("report generation failed: {0}")]
    ReportGeneration(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn failed_collections(failures: &[CollectionFailure]) -> String {
    failures
        .iter()
        .map(|f| f.collection)
        .collect::<Vec<_>>()
        .join(", ")
}

impl LifecycleError {
    pub fn validation<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let message = format!("Missing or invalid fields: {}", fields.join(", "));
        Self::Validation { fields, message }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn duplicate_id(entity: &'static str, id: impl ToString) -> Self {
        Self::DuplicateId {
            entity,
            id: id.to_string(),
        }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::ReportGeneration(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<CoreError> for LifecycleError {
    fn from(err: CoreError) -> Self {
        if !err.is_client_error() {
            return Self::Storage(StorageError::internal(err.to_string()));
        }
        Self::Validation {
            fields: err.fields(),
            message: err.to_string(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation { fields, message } => ApiError::validation(message, fields),
            e @ LifecycleError::NotFound { .. } => ApiError::not_found(e.to_string()),
            e @ LifecycleError::DuplicateId { .. } => ApiError::duplicate_id(e.to_string()),
            e @ LifecycleError::CascadeFailure { .. } => ApiError::cascade_failure(e.to_string()),
            LifecycleError::ReportGeneration(msg) => ApiError::report_generation(msg),
            LifecycleError::Storage(e) => match e.category() {
                ErrorCategory::NotFound => ApiError::not_found(e.to_string()),
                ErrorCategory::Conflict => ApiError::duplicate_id(e.to_string()),
                ErrorCategory::Validation => ApiError::bad_request(e.to_string()),
                ErrorCategory::Infrastructure | ErrorCategory::Internal => {
                    ApiError::internal(e.to_string())
                }
            },
        }
    }
}

impl IntoResponse for LifecycleError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
