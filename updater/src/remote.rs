//! 원격 시나리오 저장소 클라이언트
//!
//! 버전 파일 GET 한 번, 아카이브 zip GET 한 번만 수행합니다.

use std::time::Duration;

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::UpdaterError;
use crate::progress::download_percent;

/// 다운로드 완료된 아카이브 정보
#[derive(Debug, Clone)]
pub struct DownloadedArchive {
    pub bytes: u64,
    /// 소문자 hex SHA-256
    pub sha256: String,
}

/// 버전 파일/아카이브 URL을 가진 HTTP 클라이언트
pub struct RemoteClient {
    http: reqwest::Client,
    version_url: String,
    repo_url: String,
    timeout: Duration,
    assumed_length: u64,
}

impl RemoteClient {
    pub fn new(
        version_url: &str,
        repo_url: &str,
        timeout: Duration,
        assumed_length: u64,
    ) -> Result<Self, UpdaterError> {
        let http = reqwest::Client::builder()
            .user_agent("eeditor-updater/1.0")
            .connect_timeout(timeout)
            .build()
            .map_err(|e| UpdaterError::NetworkError {
                message: format!("failed to create HTTP client: {}", e),
                recoverable: false,
            })?;

        Ok(Self {
            http,
            version_url: version_url.to_string(),
            repo_url: repo_url.to_string(),
            timeout,
            assumed_length: assumed_length.max(1),
        })
    }

    /// 원격 버전 마커: 응답 본문 첫 줄을 trim한 값
    pub async fn fetch_version_marker(&self) -> Result<String, UpdaterError> {
        let operation = "fetch version marker";
        let response = self
            .http
            .get(&self.version_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| UpdaterError::from_reqwest(&e, operation, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpdaterError::ApiError {
                status_code: status.as_u16(),
                message: body.lines().next().unwrap_or_default().to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| UpdaterError::from_reqwest(&e, operation, self.timeout))?;
        parse_version_marker(&body)
    }

    /// 아카이브를 파일로 스트리밍. 진행률은 5–45 구간으로 보고
    ///
    /// 서버가 길이를 알려주지 않으면 `assumed_length`를 분모로 사용합니다.
    pub async fn download_archive<F>(
        &self,
        output: &mut tokio::fs::File,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<DownloadedArchive, UpdaterError>
    where
        F: Fn(u8),
    {
        let operation = "download archive";
        let response = self
            .http
            .get(&self.repo_url)
            .send()
            .await
            .map_err(|e| UpdaterError::from_reqwest(&e, operation, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::DownloadFailed { status_code: status.as_u16() });
        }

        let total = response
            .content_length()
            .filter(|len| *len > 0)
            .unwrap_or(self.assumed_length);
        tracing::info!("[Updater] Downloading {} ({} bytes expected)", self.repo_url, total);

        let mut hasher = Sha256::new();
        let mut received = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(next) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(UpdaterError::Cancelled { phase: "downloading".to_string() });
            }
            let chunk = next.map_err(|e| UpdaterError::from_reqwest(&e, operation, self.timeout))?;
            if chunk.is_empty() {
                continue;
            }
            output.write_all(&chunk).await.map_err(|e| UpdaterError::FileSystemError {
                operation: "write archive".to_string(),
                path: "<temp archive>".to_string(),
                message: e.to_string(),
            })?;
            hasher.update(&chunk);
            received += chunk.len() as u64;
            on_progress(download_percent(received, total));
        }

        output.flush().await.map_err(|e| UpdaterError::FileSystemError {
            operation: "flush archive".to_string(),
            path: "<temp archive>".to_string(),
            message: e.to_string(),
        })?;

        tracing::info!("[Updater] Downloaded {} bytes", received);
        Ok(DownloadedArchive {
            bytes: received,
            sha256: hex::encode(hasher.finalize()),
        })
    }
}

/// 버전 파일 본문에서 마커 추출
pub fn parse_version_marker(body: &str) -> Result<String, UpdaterError> {
    let marker = body.lines().next().unwrap_or_default().trim();
    if marker.is_empty() {
        return Err(UpdaterError::InvalidVersionMarker {
            message: "remote version file is empty".to_string(),
        });
    }
    Ok(marker.to_string())
}
