//! 열린 문서 세션
//!
//! 셸이 연 파일을 핸들(uuid)로 관리합니다. 페이지는 핸들로 내용을 받아 가고
//! (`{"fileName","content"}`), 편집 결과를 같은 핸들로 저장합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 문서 핸들
pub type DocumentHandle = Uuid;

#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error("Unknown document handle: {0}")]
    UnknownHandle(DocumentHandle),

    #[error("Timed out reading {path} after {secs}s")]
    Timeout { path: String, secs: u64 },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl IntoResponse for DocumentError {
    fn into_response(self) -> Response {
        let status = match &self {
            DocumentError::UnknownHandle(_) => StatusCode::NOT_FOUND,
            DocumentError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            DocumentError::Read { .. } | DocumentError::Write { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedDocument {
    pub name: String,
    pub source: PathBuf,
    pub content: String,
}

/// 페이지로 전달되는 문서 내용
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub file_name: String,
    pub content: String,
}

#[derive(Clone)]
pub struct DocumentTable {
    docs: Arc<RwLock<HashMap<DocumentHandle, OpenedDocument>>>,
    read_timeout: Duration,
}

impl DocumentTable {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            docs: Arc::new(RwLock::new(HashMap::new())),
            read_timeout,
        }
    }

    /// 파일을 읽어 새 핸들로 등록
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<DocumentHandle, DocumentError> {
        let path = path.as_ref().to_path_buf();
        let shown = path.display().to_string();

        let content = tokio::time::timeout(self.read_timeout, tokio::fs::read_to_string(&path))
            .await
            .map_err(|_| DocumentError::Timeout {
                path: shown.clone(),
                secs: self.read_timeout.as_secs(),
            })?
            .map_err(|source| DocumentError::Read { path: shown.clone(), source })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| shown.clone());

        let handle = Uuid::new_v4();
        self.docs.write().await.insert(
            handle,
            OpenedDocument { name, source: path, content },
        );
        tracing::info!("[Document] Opened {} as {}", shown, handle);
        Ok(handle)
    }

    pub async fn get(&self, handle: DocumentHandle) -> Result<OpenedDocument, DocumentError> {
        self.docs
            .read()
            .await
            .get(&handle)
            .cloned()
            .ok_or(DocumentError::UnknownHandle(handle))
    }

    pub async fn payload(&self, handle: DocumentHandle) -> Result<DocumentPayload, DocumentError> {
        let doc = self.get(handle).await?;
        Ok(DocumentPayload { file_name: doc.name, content: doc.content })
    }

    /// 원본 파일에 덮어쓰고 캐시 갱신
    pub async fn save(&self, handle: DocumentHandle, content: String) -> Result<(), DocumentError> {
        let source = self.get(handle).await?.source;
        tokio::fs::write(&source, content.as_bytes())
            .await
            .map_err(|e| DocumentError::Write { path: source.display().to_string(), source: e })?;

        let mut docs = self.docs.write().await;
        let doc = docs.get_mut(&handle).ok_or(DocumentError::UnknownHandle(handle))?;
        doc.content = content;
        tracing::info!("[Document] Saved {}", source.display());
        Ok(())
    }

    pub async fn close(&self, handle: DocumentHandle) -> Result<(), DocumentError> {
        self.docs
            .write()
            .await
            .remove(&handle)
            .map(|_| tracing::debug!("[Document] Closed {}", handle))
            .ok_or(DocumentError::UnknownHandle(handle))
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}
