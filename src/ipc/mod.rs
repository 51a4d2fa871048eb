//! 셸 ↔ 코어 IPC (로컬 HTTP)
//!
//! 두 개의 리스너로 나뉩니다. 페이지용 라우터는 샌드박스 안의 파일과 이미 열린
//! 문서 핸들만 다루고, 임의 경로를 여는 문서 API는 셸 전용 리스너에만 있습니다.
//!
//! ## 페이지 엔드포인트 (`ipc.listen_addr`)
//! - `POST /api/bridge/{read,write,list,delete}`, `GET /api/bridge/base-dir` - 파일 브리지 envelope
//! - `GET|PUT /api/document/:id` - 열린 문서 내용 조회/저장
//! - `POST /api/update/check`, `GET /api/update/status`, `POST /api/update/cancel` - 시나리오 업데이트
//! - `GET /api/start-page` - 시작 페이지 결정
//!
//! ## 셸 엔드포인트 (`ipc.shell_listen_addr`)
//! - `POST /api/shell/document/open`, `DELETE /api/shell/document/:id` - 문서 세션 열기/닫기

pub mod handlers;
pub mod updates;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use eeditor_updater_lib::{NetworkChecker, UpdateCoordinator};
use tower_http::trace::TraceLayer;

use crate::bridge::FileBridge;
use crate::config::{AssetsConfig, IpcConfig};
use crate::document::DocumentTable;

/// 핸들러가 공유하는 상태
#[derive(Clone)]
pub struct AppState {
    pub bridge: FileBridge,
    pub documents: DocumentTable,
    pub coordinator: UpdateCoordinator,
    pub checker: Arc<NetworkChecker>,
    pub assets: AssetsConfig,
}

/// 페이지용 라우터
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/bridge/read", post(handlers::bridge::read))
        .route("/api/bridge/write", post(handlers::bridge::write))
        .route("/api/bridge/list", post(handlers::bridge::list))
        .route("/api/bridge/delete", post(handlers::bridge::delete))
        .route("/api/bridge/base-dir", get(handlers::bridge::base_dir))
        .route(
            "/api/document/:id",
            get(handlers::document::get).put(handlers::document::save),
        )
        .route("/api/update/check", post(updates::check))
        .route("/api/update/status", get(updates::status))
        .route("/api/update/cancel", post(updates::cancel))
        .route("/api/start-page", get(handlers::start_page::get))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 셸 전용 라우터 - 페이지 리스너에는 올리지 않음
pub fn shell_router(state: AppState) -> Router {
    Router::new()
        .route("/api/shell/document/open", post(handlers::document::open))
        .route("/api/shell/document/:id", delete(handlers::document::close))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// IPC 서버
pub struct IPCServer {
    state: AppState,
    listen_addr: String,
    shell_listen_addr: String,
}

impl IPCServer {
    pub fn new(state: AppState, config: &IpcConfig) -> Self {
        Self {
            state,
            listen_addr: config.listen_addr.clone(),
            shell_listen_addr: config.shell_listen_addr.clone(),
        }
    }

    pub async fn start(self) -> Result<()> {
        if self.listen_addr == self.shell_listen_addr {
            anyhow::bail!("Page and shell listeners share {}", self.listen_addr);
        }

        let listener = tokio::net::TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("[IPC] Listening on http://{}", self.listen_addr);
        let shell_listener = tokio::net::TcpListener::bind(&self.shell_listen_addr).await?;
        tracing::info!("[IPC] Shell API on http://{}", self.shell_listen_addr);

        let page = router(self.state.clone());
        let shell = shell_router(self.state);
        tokio::try_join!(
            async { axum::serve(listener, page).await },
            async { axum::serve(shell_listener, shell).await },
        )?;
        Ok(())
    }
}
