//! 시나리오 업데이트 API - `/api/update/*`
//!
//! - `POST /api/update/check`  - 백그라운드 시도 시작 (202, 진행 중이면 409)
//! - `GET  /api/update/status` - 현재 단계와 진행률, 마지막 결과
//! - `POST /api/update/cancel` - 진행 중인 시도 취소

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use eeditor_updater_lib::{ProgressSink, UpdateCoordinator, UpdateEvent, UpdaterError};
use serde_json::json;

use crate::ipc::AppState;

/// 진행률을 로그로만 남기는 수신자
pub fn logging_sink() -> Arc<dyn ProgressSink> {
    Arc::new(|event: UpdateEvent| match event {
        UpdateEvent::Progress { percent } => tracing::debug!("[Updater] progress {}%", percent),
        UpdateEvent::Completed { updated } => {
            tracing::info!("[Updater] attempt finished (updated: {})", updated)
        }
    })
}

/// 시도를 시작하고 결과는 백그라운드에서 로그로 남김
pub fn spawn_attempt(
    coordinator: &UpdateCoordinator,
    sink: Arc<dyn ProgressSink>,
) -> Result<(), UpdaterError> {
    let handle = coordinator.check_and_update(sink)?;
    tokio::spawn(async move {
        match handle.await {
            Ok(outcome) => {
                if let Some(err) = &outcome.error {
                    tracing::warn!("[Updater] {:?}: {}", outcome.phase, err);
                }
            }
            Err(e) => tracing::error!("[Updater] attempt task failed: {}", e),
        }
    });
    Ok(())
}

/// POST /api/update/check
pub async fn check(State(state): State<AppState>) -> impl IntoResponse {
    match spawn_attempt(&state.coordinator, logging_sink()) {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "ok": true }))),
        Err(UpdaterError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(json!({ "ok": false, "error": UpdaterError::AlreadyRunning.to_string() })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}

/// GET /api/update/status - 네트워크 호출 없음
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.coordinator.status())
}

/// POST /api/update/cancel
pub async fn cancel(State(state): State<AppState>) -> impl IntoResponse {
    let cancelled = state.coordinator.cancel();
    Json(json!({ "ok": true, "cancelled": cancelled }))
}
