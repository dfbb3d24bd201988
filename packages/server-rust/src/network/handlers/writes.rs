//! Administrator write endpoints. Each one answers only after the store
//! confirmed the write.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tenantdesk_core::{ApprovalKind, ApprovalStatus, Record};

use super::{ApiError, AppState};
use crate::writes::{ApartmentDraft, NoticeDraft};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ApprovalStatus,
}

/// `POST /api/approvals/{kind}/{id}` with `{"status": "approved"}`.
pub async fn update_status_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Record>, ApiError> {
    let kind: ApprovalKind = kind.parse()?;
    let record = state.writes.update_status(kind, &id, request.status).await?;
    Ok(Json(record))
}

/// `DELETE /api/collections/{collection}/{id}`
pub async fn delete_record_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.writes.delete_record(&collection, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/apartments`
pub async fn create_apartment_handler(
    State(state): State<AppState>,
    Json(draft): Json<ApartmentDraft>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let record = state.writes.create_apartment(&draft).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PUT /api/apartments/{id}`
pub async fn update_apartment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<ApartmentDraft>,
) -> Result<Json<Record>, ApiError> {
    let record = state.writes.update_apartment(&id, &draft).await?;
    Ok(Json(record))
}

/// `POST /api/notices`
pub async fn post_notice_handler(
    State(state): State<AppState>,
    Json(draft): Json<NoticeDraft>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let record = state.writes.post_notice(&draft).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
