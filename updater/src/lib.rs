//! # EEditor 시나리오 업데이터 라이브러리
//!
//! 원격 저장소의 버전 마커와 로컬 마커를 비교하고, 새 버전이 있으면
//! 저장소 zip 아카이브를 내려받아 시나리오 디렉터리에 설치합니다.
//!
//! ## 동작 원리
//! - **확인(Checking)**: 버전 파일 GET → 첫 줄이 원격 마커
//! - **다운로드(Downloading)**: 아카이브 GET → 캐시 디렉터리의 임시 파일
//! - **압축 해제(Extracting)**: 스테이징 디렉터리에 풀고 성공 시 교체
//! - **완료**: 로컬 `version.txt`에 원격 마커 기록, 진행률 100
//!
//! 실패는 시도 단위로 처리됩니다. 마커는 기록되지 않고 이전 설치본은 유지되며,
//! 호출자는 `Completed { updated: false }`를 받습니다. 자동 재시도는 없습니다.
//!
//! ## 모듈
//! - **coordinator.rs**: 상태 머신, 동시 실행 직렬화, 취소
//! - **archive.rs**: zip 설치 (첫 세그먼트 제거, 스테이징 교체)
//! - **remote.rs**: 버전 파일/아카이브 HTTP 클라이언트
//! - **progress.rs**: 진행률 구간, 이벤트, 수신자
//! - **error.rs**: 에러 타입, 연결 확인
//! - **version.rs**: 마커 비교 (문자열 / 시맨틱 버전)

pub mod archive;
pub mod coordinator;
pub mod error;
pub mod progress;
pub mod remote;
pub mod version;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use archive::ArchiveInstaller;
pub use coordinator::{UpdateCoordinator, UpdateOutcome, UpdatePhase, UpdateStatus};
pub use error::{ErrorContext, NetworkChecker, UpdaterError};
pub use progress::{ProgressSink, UpdateEvent};
pub use version::VersionCompare;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ══════════════════════════════════════════════════════
// 설정
// ══════════════════════════════════════════════════════

/// 업데이트 설정 (`global.toml`의 `[updater]` 섹션)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub enabled: bool,
    /// 원격 버전 파일 URL (본문 첫 줄이 마커)
    pub version_url: String,
    /// 저장소 zip 아카이브 URL
    pub repo_url: String,
    /// 애플리케이션 전용 저장소 루트. None이면 `./data`
    pub install_root: Option<String>,
    /// 시나리오 디렉터리 이름 (install_root 기준)
    pub scenario_dir: String,
    /// 로컬 버전 마커 파일 이름 (install_root 기준)
    pub marker_file: String,
    /// 다운로드 임시 파일 디렉터리. None이면 `<install_root>/cache`
    pub cache_dir: Option<String>,
    pub version_compare: VersionCompare,
    /// 설정 시 다운로드한 아카이브의 SHA-256을 검증
    pub archive_sha256: Option<String>,
    pub request_timeout_secs: u64,
    /// Content-Length가 없을 때 진행률 분모
    pub assumed_length: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            version_url: "https://raw.githubusercontent.com/eenot-eenot/EEditor-Warnament-Scenario/refs/heads/main/version.txt".to_string(),
            repo_url: "https://github.com/eenot-eenot/EEditor-Warnament-Scenario/archive/refs/heads/main.zip".to_string(),
            install_root: None,
            scenario_dir: "scenario".to_string(),
            marker_file: "version.txt".to_string(),
            cache_dir: None,
            version_compare: VersionCompare::Lexical,
            archive_sha256: None,
            request_timeout_secs: 30,
            assumed_length: progress::ASSUMED_CONTENT_LENGTH,
        }
    }
}

/// 업데이트가 사용하는 로컬 경로 묶음
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePaths {
    pub root: PathBuf,
    pub marker: PathBuf,
    pub scenario: PathBuf,
    pub cache: PathBuf,
}

impl UpdatePaths {
    pub fn from_config(config: &UpdateConfig) -> Self {
        let root = config
            .install_root
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let cache = config
            .cache_dir
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| root.join("cache"));

        Self {
            marker: root.join(&config.marker_file),
            scenario: root.join(&config.scenario_dir),
            cache,
            root,
        }
    }
}
