//! 파일 브리지 라우트. 항상 200과 브리지가 만든 envelope 문자열을 그대로 반환합니다.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::bridge::{Envelope, FileBridge};
use crate::ipc::AppState;

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    pub path: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    #[serde(default)]
    pub path: String,
}

/// 디스크 I/O를 블로킹 풀에서 실행
async fn blocking<F>(bridge: FileBridge, f: F) -> impl IntoResponse
where
    F: FnOnce(&FileBridge) -> String + Send + 'static,
{
    let body = match tokio::task::spawn_blocking(move || f(&bridge)).await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("[IPC] Bridge task failed: {}", e);
            Envelope::error(format!("Internal bridge error: {}", e)).into_json()
        }
    };
    ([(header::CONTENT_TYPE, "application/json")], body)
}

/// POST /api/bridge/read
pub async fn read(State(state): State<AppState>, Json(req): Json<ReadRequest>) -> impl IntoResponse {
    blocking(state.bridge, move |b| b.read(&req.path, req.mode.as_deref())).await
}

/// POST /api/bridge/write
pub async fn write(State(state): State<AppState>, Json(req): Json<WriteRequest>) -> impl IntoResponse {
    blocking(state.bridge, move |b| b.write(&req.path, &req.content, req.mode.as_deref())).await
}

/// POST /api/bridge/list - path가 없으면 루트
pub async fn list(State(state): State<AppState>, body: Option<Json<PathRequest>>) -> impl IntoResponse {
    let path = body.map(|Json(req)| req.path).unwrap_or_default();
    blocking(state.bridge, move |b| b.list(&path)).await
}

/// POST /api/bridge/delete
pub async fn delete(State(state): State<AppState>, Json(req): Json<PathRequest>) -> impl IntoResponse {
    blocking(state.bridge, move |b| b.delete(&req.path)).await
}

/// GET /api/bridge/base-dir
pub async fn base_dir(State(state): State<AppState>) -> impl IntoResponse {
    blocking(state.bridge, |b| b.base_dir_envelope()).await
}
