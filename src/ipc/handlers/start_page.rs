use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::ipc::AppState;
use crate::start_page::{self, StartPage};

/// GET /api/start-page - `{kind, target}`
///
/// 시나리오가 설치되어 있으면 `scenario_index`에 그 index.html 경로가 함께 실립니다.
pub async fn get(State(state): State<AppState>) -> impl IntoResponse {
    let page = start_page::resolve(&state.bridge, &state.checker, &state.assets).await;
    let (kind, target) = match &page {
        StartPage::Bundled(path) => ("bundled", path.to_string_lossy().to_string()),
        StartPage::Remote(url) => ("remote", url.clone()),
    };
    let scenario_index = state
        .coordinator
        .is_installed()
        .then(|| state.coordinator.index_html().to_string_lossy().to_string());

    Json(json!({
        "kind": kind,
        "target": target,
        "scenario_index": scenario_index,
    }))
}
