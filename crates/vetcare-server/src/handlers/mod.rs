pub mod children;
pub mod records;
pub mod reports;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use vetcare_api::{ApiError, ApiResponse};
use vetcare_core::Counter;
use vetcare_storage::DocumentStore;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counters: Option<Vec<Counter>>,
}

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "service": "VetCare Server",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "baseUrl": state.config.base_url(),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            storage: None,
            counters: None,
        }),
    )
}

/// Readiness reads every sequence counter, which also proves storage answers.
pub async fn readyz(State(state): State<AppState>) -> Response {
    let backend = state.storage.backend_name();
    match state.lifecycle.stores().allocator.snapshot().await {
        Ok(counters) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready",
                storage: Some(backend),
                counters: Some(counters),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, storage = backend, "readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    storage: Some(backend),
                    counters: None,
                }),
            )
                .into_response()
        }
    }
}

/// Parses a request body as a JSON object.
pub(crate) fn json_object(body: &Bytes) -> Result<Value, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
    if !value.is_object() {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    }
    Ok(value)
}

/// 201 response pointing at the new resource.
pub(crate) fn created<T>(value: T, path: String) -> ApiResponse<T> {
    let response = ApiResponse::created(value);
    match HeaderValue::from_str(&path) {
        Ok(location) => response.with_header(LOCATION, location),
        Err(_) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_rejects_non_objects() {
        assert!(json_object(&Bytes::from_static(b"{\"a\":1}")).is_ok());
        assert_eq!(
            json_object(&Bytes::from_static(b"[1]")).unwrap_err().status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            json_object(&Bytes::from_static(b"{oops")).unwrap_err().status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
