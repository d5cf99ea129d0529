use thiserror::Error;

/// Core error types for clinical record operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Missing or invalid fields: {}", fields.join(", "))]
    Validation { fields: Vec<String> },

    #[error("Field '{field}' may not be supplied by the client")]
    ForbiddenField { field: String },

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a Validation error listing the offending fields
    pub fn validation<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Validation {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a ForbiddenField error
    pub fn forbidden_field(field: impl Into<String>) -> Self {
        Self::ForbiddenField {
            field: field.into(),
        }
    }

    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp(value.into())
    }

    /// Create a new InvalidDocument error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Field names carried by this error, if any
    pub fn fields(&self) -> Vec<String> {
        match self {
            Self::Validation { fields } => fields.clone(),
            Self::ForbiddenField { field } => vec![field.clone()],
            _ => Vec::new(),
        }
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::JsonError(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. }
            | Self::ForbiddenField { .. }
            | Self::InvalidId(_)
            | Self::InvalidTimestamp(_)
            | Self::InvalidDocument { .. } => ErrorCategory::Validation,
            Self::JsonError(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error categories for monitoring and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
