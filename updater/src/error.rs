//! 에러 처리 및 연결 확인
//!
//! ## 지원하는 에러 상황
//! - 네트워크 끊김 / 타임아웃
//! - 버전 파일 / 아카이브 다운로드 실패 (HTTP 상태 코드)
//! - 파일 시스템 오류
//! - 압축 해제 실패, 체크섬 불일치
//! - 동시 실행 거부, 취소

use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// 업데이터 에러 타입
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum UpdaterError {
    /// 네트워크 연결 실패
    NetworkError {
        message: String,
        recoverable: bool,
    },
    /// HTTP 요청 타임아웃
    Timeout {
        operation: String,
        duration_secs: u64,
    },
    /// 버전 파일 요청이 성공 상태가 아님
    ApiError {
        status_code: u16,
        message: String,
    },
    /// 아카이브 요청이 성공 상태가 아님
    DownloadFailed {
        status_code: u16,
    },
    /// 원격 버전 파일이 비어 있음
    InvalidVersionMarker {
        message: String,
    },
    /// 파일 시스템 오류
    FileSystemError {
        operation: String,
        path: String,
        message: String,
    },
    /// 압축 해제 실패
    ExtractionFailed {
        entry: Option<String>,
        message: String,
    },
    /// 검증 실패 (해시 불일치 등)
    ValidationError {
        component: String,
        expected: String,
        actual: String,
    },
    /// 이미 다른 업데이트 시도가 진행 중
    AlreadyRunning,
    /// 진행 중인 시도가 취소됨
    Cancelled {
        phase: String,
    },
    /// 시도 태스크 내부 패닉
    Internal {
        message: String,
    },
}

impl fmt::Display for UpdaterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdaterError::NetworkError { message, .. } => {
                write!(f, "Network error: {}", message)
            }
            UpdaterError::Timeout { operation, duration_secs } => {
                write!(f, "Timeout after {}s: {}", duration_secs, operation)
            }
            UpdaterError::ApiError { status_code, message } => {
                write!(f, "API error ({}): {}", status_code, message)
            }
            UpdaterError::DownloadFailed { status_code } => {
                write!(f, "Server returned HTTP {}", status_code)
            }
            UpdaterError::InvalidVersionMarker { message } => {
                write!(f, "Invalid version marker: {}", message)
            }
            UpdaterError::FileSystemError { operation, path, message } => {
                write!(f, "File system error during {} on '{}': {}", operation, path, message)
            }
            UpdaterError::ExtractionFailed { entry, message } => match entry {
                Some(entry) => write!(f, "Extraction failed at '{}': {}", entry, message),
                None => write!(f, "Extraction failed: {}", message),
            },
            UpdaterError::ValidationError { component, expected, actual } => {
                write!(
                    f,
                    "Validation failed for {}: expected {}, got {}",
                    component, expected, actual
                )
            }
            UpdaterError::AlreadyRunning => {
                write!(f, "An update attempt is already running")
            }
            UpdaterError::Cancelled { phase } => {
                write!(f, "Update cancelled during {}", phase)
            }
            UpdaterError::Internal { message } => {
                write!(f, "Internal updater error: {}", message)
            }
        }
    }
}

impl std::error::Error for UpdaterError {}

impl UpdaterError {
    /// 다음 명시적 호출에서 재시도할 가치가 있는 에러인지 확인
    pub fn is_recoverable(&self) -> bool {
        match self {
            UpdaterError::NetworkError { recoverable, .. } => *recoverable,
            UpdaterError::Timeout { .. } => true,
            // 5xx 에러는 재시도 가능, 4xx는 불가능
            UpdaterError::ApiError { status_code, .. } => *status_code >= 500,
            UpdaterError::DownloadFailed { status_code } => *status_code >= 500,
            UpdaterError::InvalidVersionMarker { .. } => false,
            UpdaterError::FileSystemError { .. } => false,
            UpdaterError::ExtractionFailed { .. } => true, // 재다운로드로 복구 가능
            UpdaterError::ValidationError { .. } => true,
            UpdaterError::AlreadyRunning => true,
            UpdaterError::Cancelled { .. } => true,
            UpdaterError::Internal { .. } => false,
        }
    }

    /// reqwest 에러를 UpdaterError로 변환
    pub fn from_reqwest(err: &reqwest::Error, operation: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            UpdaterError::Timeout {
                operation: operation.to_string(),
                duration_secs: timeout.as_secs(),
            }
        } else if err.is_connect() {
            UpdaterError::NetworkError {
                message: format!("connection failed: {}", err),
                recoverable: true,
            }
        } else if let Some(status) = err.status() {
            UpdaterError::ApiError {
                status_code: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            UpdaterError::NetworkError {
                message: err.to_string(),
                recoverable: err.is_request() || err.is_body(),
            }
        }
    }

    /// IO 에러를 UpdaterError로 변환
    pub fn from_io(err: &std::io::Error, operation: &str, path: &std::path::Path) -> Self {
        UpdaterError::FileSystemError {
            operation: operation.to_string(),
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// 에러 컨텍스트 (디버깅/로깅용)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub timestamp: String,
    pub operation: String,
    pub component: Option<String>,
    pub error: UpdaterError,
}

impl ErrorContext {
    pub fn new(operation: &str, error: UpdaterError) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            operation: operation.to_string(),
            component: None,
            error,
        }
    }

    pub fn with_component(mut self, component: &str) -> Self {
        self.component = Some(component.to_string());
        self
    }

    /// 로그 출력
    pub fn log(&self) {
        if self.error.is_recoverable() {
            tracing::warn!(
                "[Error] {} - {} (recoverable): {}",
                self.operation,
                self.component.as_deref().unwrap_or("N/A"),
                self.error
            );
        } else {
            tracing::error!(
                "[Error] {} - {} (fatal): {}",
                self.operation,
                self.component.as_deref().unwrap_or("N/A"),
                self.error
            );
        }
    }
}

/// 네트워크 상태 체커 - 시작 페이지 선택에 사용
pub struct NetworkChecker {
    /// 체크할 엔드포인트 목록
    endpoints: Vec<String>,
    /// 타임아웃
    timeout: Duration,
}

impl NetworkChecker {
    pub const DEFAULT_PROBE_URL: &'static str = "http://clients3.google.com/generate_204";

    pub fn new() -> Self {
        Self::with_endpoints(vec![Self::DEFAULT_PROBE_URL.to_string()], Duration::from_secs(5))
    }

    pub fn with_endpoints(endpoints: Vec<String>, timeout: Duration) -> Self {
        Self { endpoints, timeout }
    }

    /// 네트워크 연결 상태 확인 (2xx/3xx 응답이면 온라인)
    pub async fn check_connectivity(&self) -> bool {
        let client = match reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("[Network] Failed to build probe client: {}", e);
                return false;
            }
        };

        for endpoint in &self.endpoints {
            match client.head(endpoint).send().await {
                Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                    return true;
                }
                Ok(resp) => {
                    tracing::debug!("[Network] Probe {} answered {}", endpoint, resp.status());
                }
                Err(e) => {
                    tracing::debug!("[Network] Probe {} failed: {}", endpoint, e);
                }
            }
        }

        false
    }
}

impl Default for NetworkChecker {
    fn default() -> Self {
        Self::new()
    }
}
