use axum::{
    body::Bytes,
    extract::{Path, State},
};
use vetcare_api::{ApiError, ApiResponse};
use vetcare_core::{Record, ResourceRef};

use super::{created, json_object};
use crate::lifecycle::DeletedRecord;
use crate::server::AppState;

pub async fn list_records(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Record>>, ApiError> {
    let records = state.lifecycle.stores().records.list(None).await?;
    Ok(ApiResponse::ok(records))
}

pub async fn create_record(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<Record>, ApiError> {
    let payload = json_object(&body)?;
    let record = state.lifecycle.create(&payload).await?;
    let location = format!("/records/{}", record.id);
    Ok(created(record, location))
}

pub async fn read_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Record>, ApiError> {
    let record = state
        .lifecycle
        .stores()
        .records
        .require(&ResourceRef::parse(id))
        .await?;
    Ok(ApiResponse::ok(record))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<Record>, ApiError> {
    let patch = json_object(&body)?;
    let record = state
        .lifecycle
        .update(&ResourceRef::parse(id), &patch)
        .await?;
    Ok(ApiResponse::ok(record))
}

/// Deletes the record and all of its children.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<DeletedRecord>, ApiError> {
    let deleted = state
        .lifecycle
        .delete_record_and_children(&ResourceRef::parse(id.clone()))
        .await
        .inspect_err(|e| {
            if !e.is_not_found() {
                tracing::error!(entity = "Record", id = %id, error = %e, "record delete failed");
            }
        })?;
    Ok(ApiResponse::ok(deleted))
}
