use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const JSON_CONTENT_TYPE: &str = "application/json";

/// JSON error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    /// Stable machine-readable code: validation | not-found | duplicate-id | ...
    pub error: String,
    /// Human-readable description
    pub message: String,
    /// Offending fields for validation failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }
}

/// High-level API errors to be mapped to HTTP responses
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Validation failed: {message}")]
    Validation { message: String, fields: Vec<String> },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Duplicate id: {0}")]
    DuplicateId(String),
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("Cascade delete failed: {0}")]
    CascadeFailure(String),
    #[error("Report generation failed: {0}")]
    ReportGeneration(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn validation(msg: impl Into<String>, fields: Vec<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            fields,
        }
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn duplicate_id(msg: impl Into<String>) -> Self {
        Self::DuplicateId(msg.into())
    }
    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(msg.into())
    }
    pub fn cascade_failure(msg: impl Into<String>) -> Self {
        Self::CascadeFailure(msg.into())
    }
    pub fn report_generation(msg: impl Into<String>) -> Self {
        Self::ReportGeneration(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateId(_) => StatusCode::CONFLICT,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::CascadeFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ReportGeneration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad-request",
            ApiError::Validation { .. } => "validation",
            ApiError::NotFound(_) => "not-found",
            ApiError::DuplicateId(_) => "duplicate-id",
            ApiError::UnsupportedMediaType(_) => "unsupported-media-type",
            ApiError::CascadeFailure(_) => "cascade-failure",
            ApiError::ReportGeneration(_) => "report-generation",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn to_error_body(&self) -> ErrorBody {
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::DuplicateId(msg)
            | ApiError::UnsupportedMediaType(msg)
            | ApiError::CascadeFailure(msg)
            | ApiError::ReportGeneration(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::Validation { message, .. } => message.clone(),
        };
        let body = ErrorBody::new(self.code(), message);
        match self {
            ApiError::Validation { fields, .. } => body.with_fields(fields.clone()),
            _ => body,
        }
    }
}

fn json_response(status: StatusCode, body: Vec<u8>, extra: Vec<(HeaderName, HeaderValue)>) -> Response {
    let mut builder = axum::http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    for (name, value) in extra {
        builder = builder.header(name, value);
    }
    builder
        .body(axum::body::Body::from(body))
        .unwrap_or_else(|_| {
            let mut fallback = Response::new(axum::body::Body::from("{}"));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            fallback
        })
}

fn serialization_failure() -> Vec<u8> {
    serde_json::to_vec(&ErrorBody::new("internal", "Serialization failure"))
        .unwrap_or_else(|_| b"{}".to_vec())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::to_vec(&self.to_error_body()).unwrap_or_else(|_| serialization_failure());
        json_response(self.status_code(), body, Vec::new())
    }
}


// -------------------------
// API Response Wrapper
// -------------------------

#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    pub fn created(value: T) -> Self {
        Self::new(value, StatusCode::CREATED)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = serde_json::to_vec(&self.value).unwrap_or_else(|_| serialization_failure());
        json_response(self.status, body, self.headers)
    }
}


// -------------------------
// Binary attachments
// -------------------------

/// A downloadable file body, sent with `Content-Disposition: attachment`.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

impl Attachment {
    pub fn new(bytes: Vec<u8>, content_type: &'static str, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type,
            file_name: file_name.into(),
        }
    }

    pub fn pdf(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self::new(bytes, "application/pdf", file_name)
    }

    fn disposition(&self) -> String {
        // quotes and control characters cannot appear inside the quoted filename
        let safe: String = self
            .file_name
            .chars()
            .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
            .collect();
        format!("attachment; filename=\"{safe}\"")
    }
}

impl IntoResponse for Attachment {
    fn into_response(self) -> Response {
        let disposition = match HeaderValue::from_str(&self.disposition()) {
            Ok(value) => value,
            Err(_) => HeaderValue::from_static("attachment"),
        };
        let mut response = Response::new(axum::body::Body::from(self.bytes));
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        headers.insert(header::CONTENT_DISPOSITION, disposition);
        response
    }
}

#[cfg(test)]
mod attachment_tests {
    use super::*;

    #[test]
    fn pdf_attachment_sets_download_headers() {
        let resp = Attachment::pdf(b"%PDF-1.3".to_vec(), "MedicalRecord_7.pdf").into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            &HeaderValue::from_static("application/pdf")
        );
        assert_eq!(
            resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            &HeaderValue::from_static("attachment; filename=\"MedicalRecord_7.pdf\"")
        );
    }

    #[test]
    fn disposition_strips_quotes() {
        let attachment = Attachment::pdf(Vec::new(), "a\"b.pdf");
        assert_eq!(attachment.disposition(), "attachment; filename=\"ab.pdf\"");
    }
}
