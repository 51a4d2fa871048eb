use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::document::DocumentError;
use crate::ipc::AppState;

#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub content: String,
}

/// POST /api/shell/document/open - 파일을 열고 핸들 발급 (셸 전용)
pub async fn open(
    State(state): State<AppState>,
    Json(req): Json<OpenRequest>,
) -> Result<impl IntoResponse, DocumentError> {
    let id = state.documents.open(&req.path).await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "id": id }))))
}

/// GET /api/document/:id - `{fileName, content}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, DocumentError> {
    Ok(Json(state.documents.payload(id).await?))
}

/// PUT /api/document/:id - 원본 파일에 저장
pub async fn save(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SaveRequest>,
) -> Result<impl IntoResponse, DocumentError> {
    state.documents.save(id, req.content).await?;
    Ok(Json(json!({ "ok": true })))
}

/// DELETE /api/shell/document/:id (셸 전용)
pub async fn close(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, DocumentError> {
    state.documents.close(id).await?;
    Ok(Json(json!({ "ok": true })))
}
