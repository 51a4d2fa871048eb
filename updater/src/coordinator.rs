//! 업데이트 코디네이터 - 확인/다운로드/설치 상태 머신
//!
//! `Idle → Checking → (UpToDate | Downloading → Extracting → Installed) → Idle`,
//! 그리고 Checking/Downloading/Extracting 어디서든 `Failed`.
//!
//! 한 번에 하나의 시도만 실행됩니다. 진행 중에 들어온 요청은
//! `UpdaterError::AlreadyRunning`으로 거부됩니다.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveInstaller;
use crate::error::{ErrorContext, UpdaterError};
use crate::progress::{ProgressReporter, ProgressSink, UpdateEvent, CHECK_START, DOWNLOAD_START};
use crate::remote::RemoteClient;
use crate::{UpdateConfig, UpdatePaths};

/// 코디네이터 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    Idle,
    Checking,
    UpToDate,
    Downloading,
    Extracting,
    Installed,
    Failed,
}

/// 한 번의 시도 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub updated: bool,
    /// 종료 상태 (UpToDate / Installed / Failed)
    pub phase: UpdatePhase,
    pub remote_marker: Option<String>,
    pub error: Option<UpdaterError>,
    pub finished_at: String,
}

/// 현재 상태 스냅샷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub phase: UpdatePhase,
    pub progress: Option<u8>,
    pub last_outcome: Option<UpdateOutcome>,
}

impl Default for UpdateStatus {
    fn default() -> Self {
        Self {
            phase: UpdatePhase::Idle,
            progress: None,
            last_outcome: None,
        }
    }
}

struct Inner {
    config: UpdateConfig,
    paths: UpdatePaths,
    client: RemoteClient,
    running: Arc<tokio::sync::Mutex<()>>,
    status: RwLock<UpdateStatus>,
    cancel: Mutex<Option<CancellationToken>>,
}

/// 업데이트 코디네이터 (Clone 시 같은 상태를 공유)
#[derive(Clone)]
pub struct UpdateCoordinator {
    inner: Arc<Inner>,
}

enum Finish {
    UpToDate(String),
    Installed(String),
}

impl UpdateCoordinator {
    pub fn new(config: UpdateConfig) -> Result<Self, UpdaterError> {
        let paths = UpdatePaths::from_config(&config);
        let client = RemoteClient::new(
            &config.version_url,
            &config.repo_url,
            Duration::from_secs(config.request_timeout_secs.max(1)),
            config.assumed_length,
        )?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                paths,
                client,
                running: Arc::new(tokio::sync::Mutex::new(())),
                status: RwLock::new(UpdateStatus::default()),
                cancel: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.inner.config
    }

    pub fn paths(&self) -> &UpdatePaths {
        &self.inner.paths
    }

    /// 설치된 시나리오의 시작 페이지
    pub fn index_html(&self) -> PathBuf {
        self.inner.paths.scenario.join("index.html")
    }

    pub fn is_installed(&self) -> bool {
        self.index_html().is_file()
    }

    pub fn status(&self) -> UpdateStatus {
        self.inner
            .status
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.try_lock().is_err()
    }

    /// 로컬 버전 마커 (파일이 없거나 비어 있으면 빈 문자열)
    pub async fn local_marker(&self) -> Result<String, UpdaterError> {
        read_marker(&self.inner.paths.marker).await
    }

    /// 진행 중인 시도 취소. 취소할 시도가 있었으면 true
    pub fn cancel(&self) -> bool {
        match self.inner.cancel.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(token) => {
                    token.cancel();
                    tracing::info!("[Updater] Cancellation requested");
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// 업데이트 확인 및 적용을 백그라운드 태스크로 시작
    ///
    /// 호출자는 블로킹되지 않으며 진행률과 완료는 `sink`로 전달됩니다.
    /// 이미 시도가 진행 중이면 `AlreadyRunning`을 반환하고 `sink`는 호출되지 않습니다.
    pub fn check_and_update(
        &self,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<JoinHandle<UpdateOutcome>, UpdaterError> {
        let guard = self
            .inner
            .running
            .clone()
            .try_lock_owned()
            .map_err(|_| UpdaterError::AlreadyRunning)?;

        // spawn 전에 토큰을 등록해 첫 poll 전의 cancel()도 반영
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.inner.cancel.lock() {
            *slot = Some(token.clone());
        }
        self.set_progress(None);

        let this = self.clone();
        Ok(tokio::spawn(async move { this.run_attempt(sink, token, guard).await }))
    }

    /// 한 번의 시도. 완료 이벤트 전에 실행 잠금을 풀어 완료 콜백에서의 재시도를 허용
    async fn run_attempt(
        &self,
        sink: Arc<dyn ProgressSink>,
        token: CancellationToken,
        guard: OwnedMutexGuard<()>,
    ) -> UpdateOutcome {
        let recorder = self.clone();
        let tracked = move |event: UpdateEvent| {
            if let UpdateEvent::Progress { percent } = event {
                recorder.set_progress(Some(percent));
            }
            sink.emit(event);
        };
        let reporter = Arc::new(ProgressReporter::new(Arc::new(tracked)));

        let result = match AssertUnwindSafe(self.attempt(&reporter, &token))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(UpdaterError::Internal { message: panic_message(panic.as_ref()) }),
        };

        let outcome = match result {
            Ok(Finish::UpToDate(remote)) => {
                tracing::info!("[Updater] Scenario is up to date ({})", remote);
                self.outcome(false, UpdatePhase::UpToDate, Some(remote), None)
            }
            Ok(Finish::Installed(remote)) => {
                tracing::info!("[Updater] Scenario updated to {}", remote);
                self.outcome(true, UpdatePhase::Installed, Some(remote), None)
            }
            Err(e) => {
                ErrorContext::new("check_and_update", e.clone())
                    .with_component("scenario")
                    .log();
                self.outcome(false, UpdatePhase::Failed, None, Some(e))
            }
        };

        if let Ok(mut slot) = self.inner.cancel.lock() {
            *slot = None;
        }
        if let Ok(mut status) = self.inner.status.write() {
            status.phase = UpdatePhase::Idle;
            status.last_outcome = Some(outcome.clone());
        }
        drop(guard);

        // 상태 갱신 후 완료 이벤트 전달
        let full = outcome.phase != UpdatePhase::Failed;
        reporter.finish(outcome.updated, full);
        outcome
    }

    async fn attempt(
        &self,
        reporter: &Arc<ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<Finish, UpdaterError> {
        let paths = &self.inner.paths;

        self.set_phase(UpdatePhase::Checking);
        reporter.report(CHECK_START);
        let remote = self.inner.client.fetch_version_marker().await?;
        let local = read_marker(&paths.marker).await?;
        tracing::info!("[Updater] Version marker local='{}' remote='{}'", local, remote);

        if !self.inner.config.version_compare.needs_update(&local, &remote) {
            self.set_phase(UpdatePhase::UpToDate);
            return Ok(Finish::UpToDate(remote));
        }
        if cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled { phase: "checking".to_string() });
        }

        self.set_phase(UpdatePhase::Downloading);
        reporter.report(DOWNLOAD_START);
        tokio::fs::create_dir_all(&paths.cache)
            .await
            .map_err(|e| UpdaterError::from_io(&e, "create cache dir", &paths.cache))?;
        let temp = tempfile::Builder::new()
            .prefix("scenario")
            .suffix(".zip")
            .tempfile_in(&paths.cache)
            .map_err(|e| UpdaterError::from_io(&e, "create temp archive", &paths.cache))?;
        let handle = temp
            .reopen()
            .map_err(|e| UpdaterError::from_io(&e, "open temp archive", temp.path()))?;
        let mut output = tokio::fs::File::from_std(handle);

        let r = reporter.clone();
        let archive = self
            .inner
            .client
            .download_archive(&mut output, move |p| r.report(p), cancel)
            .await?;
        drop(output);

        if let Some(expected) = self.inner.config.archive_sha256.as_deref() {
            let expected = expected.trim().to_ascii_lowercase();
            if expected != archive.sha256 {
                return Err(UpdaterError::ValidationError {
                    component: "scenario archive".to_string(),
                    expected,
                    actual: archive.sha256,
                });
            }
        }

        self.set_phase(UpdatePhase::Extracting);
        let installer = ArchiveInstaller::new(&paths.scenario);
        let r = reporter.clone();
        let token = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(temp.path())
                .map_err(|e| UpdaterError::from_io(&e, "open temp archive", temp.path()))?;
            let installed = installer.install(std::io::BufReader::new(file), |p| r.report(p), &token);
            // temp는 여기서 삭제됨
            drop(temp);
            installed
        })
        .await
        .map_err(|e| UpdaterError::ExtractionFailed {
            entry: None,
            message: format!("extraction task failed: {}", e),
        })??;

        write_marker(&paths.marker, &remote).await?;
        self.set_phase(UpdatePhase::Installed);
        Ok(Finish::Installed(remote))
    }

    fn outcome(
        &self,
        updated: bool,
        phase: UpdatePhase,
        remote_marker: Option<String>,
        error: Option<UpdaterError>,
    ) -> UpdateOutcome {
        UpdateOutcome {
            updated,
            phase,
            remote_marker,
            error,
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn set_phase(&self, phase: UpdatePhase) {
        if let Ok(mut status) = self.inner.status.write() {
            status.phase = phase;
        }
        tracing::debug!("[Updater] Phase -> {:?}", phase);
    }

    fn set_progress(&self, progress: Option<u8>) {
        if let Ok(mut status) = self.inner.status.write() {
            status.progress = progress;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "attempt panicked".to_string()
    }
}

async fn read_marker(path: &Path) -> Result<String, UpdaterError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content.lines().next().unwrap_or_default().trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(UpdaterError::from_io(&e, "read version marker", path)),
    }
}

/// 임시 파일에 쓴 뒤 rename으로 교체
async fn write_marker(path: &Path, marker: &str) -> Result<(), UpdaterError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| UpdaterError::from_io(&e, "create marker dir", parent))?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, marker)
        .await
        .map_err(|e| UpdaterError::from_io(&e, "write version marker", &tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| UpdaterError::from_io(&e, "replace version marker", path))
}
