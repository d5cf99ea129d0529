//! CRUD handlers shared by prescriptions, vaccinations and lab results.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use vetcare_api::{ApiError, ApiResponse};
use vetcare_core::{AllocatedId, ClinicalEntity, ResourceRef};

use super::{created, json_object};
use crate::entity_store::ChildEntity;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ChildQuery {
    #[serde(rename = "RecordId")]
    pub record_id: Option<String>,
}

impl ChildQuery {
    fn record_id(&self) -> Result<Option<AllocatedId>, ApiError> {
        self.record_id
            .as_deref()
            .map(|raw| {
                raw.trim().parse::<AllocatedId>().map_err(|_| {
                    ApiError::validation(
                        format!("RecordId must be a positive integer, got '{raw}'"),
                        vec!["RecordId".into()],
                    )
                })
            })
            .transpose()
    }
}

pub async fn list<E: ChildEntity>(
    State(state): State<AppState>,
    Query(query): Query<ChildQuery>,
) -> Result<ApiResponse<Vec<E>>, ApiError> {
    let record_id = query.record_id()?;
    let items = E::store(state.lifecycle.stores()).list(record_id).await?;
    Ok(ApiResponse::ok(items))
}

pub async fn create<E: ChildEntity>(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<E>, ApiError> {
    let payload = json_object(&body)?;
    let entity: E = state.lifecycle.create_child(&payload).await?;
    let location = format!("/{}/{}", E::COLLECTION, entity.storage_id());
    Ok(created(entity, location))
}

pub async fn read<E: ChildEntity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<E>, ApiError> {
    let entity = E::store(state.lifecycle.stores())
        .require(&ResourceRef::parse(id))
        .await?;
    Ok(ApiResponse::ok(entity))
}

/// `RecordId` and the allocated id are never changed by an update.
pub async fn update<E: ChildEntity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<E>, ApiError> {
    let patch = json_object(&body)?;
    let entity = E::store(state.lifecycle.stores())
        .update(&ResourceRef::parse(id), &patch)
        .await?;
    Ok(ApiResponse::ok(entity))
}

/// Idempotent: deleting a missing entity also answers 204.
pub async fn delete<E: ChildEntity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    E::store(state.lifecycle.stores())
        .delete(&ResourceRef::parse(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
