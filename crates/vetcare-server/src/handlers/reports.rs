use axum::{
    extract::{Path, State},
    http::HeaderMap,
};
use vetcare_api::{ApiError, Attachment};
use vetcare_core::ResourceRef;

use crate::report::{pdf, request_origin};
use crate::server::AppState;

/// `GET /records/{id}/report.pdf`
pub async fn record_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Attachment, ApiError> {
    let origin = request_origin(&headers, state.config.reports.trust_forwarded_headers);
    let report = state
        .reports
        .build_report(&ResourceRef::parse(id.clone()), origin.as_ref())
        .await?;
    let file_name = report.file_name();

    let bytes = tokio::task::spawn_blocking(move || pdf::render(&report))
        .await
        .map_err(|e| ApiError::report_generation(format!("PDF task failed: {e}")))?
        .inspect_err(|e| {
            tracing::error!(entity = "Record", id = %id, error = %e, "report generation failed");
        })?;

    Ok(Attachment::pdf(bytes, file_name))
}
