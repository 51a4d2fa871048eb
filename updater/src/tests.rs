//! 업데이트 파이프라인 테스트
//!
//! ## 테스트 시나리오
//! 1. 신규 설치: 로컬 마커 없음 → 다운로드, 압축 해제, 마커 기록
//! 2. 최신 상태: 로컬 마커가 더 큼 → 아카이브 요청 없음
//! 3. 손상된 아카이브: 마커와 기존 설치본 유지
//! 4. HTTP 실패, 체크섬 불일치, 동시 실행 거부, 취소
//!
//! 원격 저장소는 `127.0.0.1:0`에 바인드한 axum 모킹 서버로 대체합니다.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::progress::{self, ProgressSink, UpdateEvent};
use crate::{UpdateConfig, UpdateCoordinator, UpdatePhase, UpdaterError};

// ═══════════════════════════════════════════════════════
// 테스트 유틸리티
// ═══════════════════════════════════════════════════════

/// 모킹 저장소 응답 설정
#[derive(Clone)]
struct MockRepo {
    version: String,
    version_status: StatusCode,
    version_delay: Duration,
    archive: Vec<u8>,
    archive_status: StatusCode,
}

impl MockRepo {
    fn new(version: &str, archive: Vec<u8>) -> Self {
        Self {
            version: version.to_string(),
            version_status: StatusCode::OK,
            version_delay: Duration::ZERO,
            archive,
            archive_status: StatusCode::OK,
        }
    }
}

/// 테스트용 zip 생성 - 모든 엔트리를 `repo-main/` 아래에 패킹
fn create_scenario_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    writer.add_directory("repo-main/", options).unwrap();
    for (name, content) in files {
        writer.start_file(format!("repo-main/{}", name), options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// 모킹 서버 시작. 반환: (주소, 아카이브 요청 횟수)
async fn start_mock_repo(repo: MockRepo) -> (SocketAddr, Arc<AtomicUsize>) {
    let archive_hits = Arc::new(AtomicUsize::new(0));
    let repo = Arc::new(repo);

    let app = Router::new()
        .route("/version.txt", get({
            let repo = repo.clone();
            move || {
                let repo = repo.clone();
                async move {
                    tokio::time::sleep(repo.version_delay).await;
                    (repo.version_status, repo.version.clone())
                }
            }
        }))
        .route("/main.zip", get({
            let repo = repo.clone();
            let hits = archive_hits.clone();
            move || {
                let repo = repo.clone();
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (repo.archive_status, repo.archive.clone())
                }
            }
        }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, archive_hits)
}

fn test_config(addr: SocketAddr, root: &TempDir) -> UpdateConfig {
    UpdateConfig {
        version_url: format!("http://{}/version.txt", addr),
        repo_url: format!("http://{}/main.zip", addr),
        install_root: Some(root.path().to_string_lossy().to_string()),
        request_timeout_secs: 5,
        ..UpdateConfig::default()
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<UpdateEvent>) -> Vec<UpdateEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

fn percents(events: &[UpdateEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            UpdateEvent::Progress { percent } => Some(*percent),
            _ => None,
        })
        .collect()
}

/// 진행률 불변식: 0 이상 비감소, 완료 이벤트는 마지막에 정확히 한 번
fn assert_well_formed(events: &[UpdateEvent]) {
    let p = percents(events);
    assert!(p.windows(2).all(|w| w[0] <= w[1]), "진행률이 감소함: {:?}", p);
    let completions = events
        .iter()
        .filter(|e| matches!(e, UpdateEvent::Completed { .. }))
        .count();
    assert_eq!(completions, 1);
    assert!(matches!(events.last(), Some(UpdateEvent::Completed { .. })));
}

// ═══════════════════════════════════════════════════════
// 1. 신규 설치
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_fresh_install_downloads_and_writes_marker() {
    let tmp = TempDir::new().unwrap();
    let zip = create_scenario_zip(&[
        ("index.html", b"<h1>scenario</h1>"),
        ("data/units.json", b"{\"units\":[]}"),
    ]);
    let (addr, hits) = start_mock_repo(MockRepo::new("1\n", zip)).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();

    let (sink, mut rx) = progress::channel();
    let outcome = coordinator.check_and_update(sink).unwrap().await.unwrap();

    assert!(outcome.updated);
    assert_eq!(outcome.phase, UpdatePhase::Installed);
    assert_eq!(outcome.remote_marker.as_deref(), Some("1"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let paths = coordinator.paths();
    assert_eq!(std::fs::read_to_string(&paths.marker).unwrap(), "1");
    assert_eq!(
        std::fs::read_to_string(paths.scenario.join("index.html")).unwrap(),
        "<h1>scenario</h1>"
    );
    assert!(paths.scenario.join("data/units.json").exists());
    assert!(coordinator.is_installed());
    assert_eq!(coordinator.index_html(), paths.scenario.join("index.html"));

    // 임시 아카이브가 남지 않음
    let leftovers = std::fs::read_dir(&paths.cache).unwrap().count();
    assert_eq!(leftovers, 0);

    let events = drain(&mut rx);
    assert_well_formed(&events);
    let p = percents(&events);
    assert_eq!(p.first(), Some(&0));
    assert!(p.contains(&5));
    assert!(p.contains(&45));
    assert!(p.contains(&50));
    assert_eq!(p.iter().filter(|v| **v == 100).count(), 1);
    assert_eq!(p.last(), Some(&100));
    assert_eq!(events.last(), Some(&UpdateEvent::Completed { updated: true }));

    let status = coordinator.status();
    assert_eq!(status.phase, UpdatePhase::Idle);
    assert_eq!(status.progress, Some(100));
    assert!(status.last_outcome.unwrap().updated);
}

// ═══════════════════════════════════════════════════════
// 2. 최신 상태
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_newer_local_marker_skips_download() {
    let tmp = TempDir::new().unwrap();
    let (addr, hits) = start_mock_repo(MockRepo::new("1", create_scenario_zip(&[]))).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();
    std::fs::write(&coordinator.paths().marker, "2\n").unwrap();

    let (sink, mut rx) = progress::channel();
    let outcome = coordinator.check_and_update(sink).unwrap().await.unwrap();

    assert!(!outcome.updated);
    assert_eq!(outcome.phase, UpdatePhase::UpToDate);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(coordinator.local_marker().await.unwrap(), "2");

    let events = drain(&mut rx);
    assert_well_formed(&events);
    assert_eq!(percents(&events), vec![0, 100]);
    assert_eq!(events.last(), Some(&UpdateEvent::Completed { updated: false }));
}

#[tokio::test]
async fn test_lexical_comparison_is_preserved() {
    let tmp = TempDir::new().unwrap();
    let (addr, hits) = start_mock_repo(MockRepo::new("10", create_scenario_zip(&[]))).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();
    std::fs::write(&coordinator.paths().marker, "9").unwrap();

    let (sink, _rx) = progress::channel();
    let outcome = coordinator.check_and_update(sink).unwrap().await.unwrap();

    // "10" < "9" (문자열 순서)
    assert!(!outcome.updated);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_semver_comparison_opt_in() {
    let tmp = TempDir::new().unwrap();
    let zip = create_scenario_zip(&[("index.html", b"v10")]);
    let (addr, _) = start_mock_repo(MockRepo::new("10", zip)).await;
    let config = UpdateConfig {
        version_compare: crate::VersionCompare::Semver,
        ..test_config(addr, &tmp)
    };
    let coordinator = UpdateCoordinator::new(config).unwrap();
    std::fs::write(&coordinator.paths().marker, "9").unwrap();

    let (sink, _rx) = progress::channel();
    let outcome = coordinator.check_and_update(sink).unwrap().await.unwrap();
    assert!(outcome.updated);
    assert_eq!(coordinator.local_marker().await.unwrap(), "10");
}

// ═══════════════════════════════════════════════════════
// 3. 실패 처리
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_truncated_archive_keeps_marker_and_previous_install() {
    let tmp = TempDir::new().unwrap();
    let mut zip = create_scenario_zip(&[("index.html", b"new content for version two")]);
    zip.truncate(zip.len() - 30);
    let (addr, _) = start_mock_repo(MockRepo::new("2", zip)).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();

    let paths = coordinator.paths().clone();
    std::fs::write(&paths.marker, "1").unwrap();
    std::fs::create_dir_all(&paths.scenario).unwrap();
    std::fs::write(paths.scenario.join("index.html"), "old").unwrap();

    let (sink, mut rx) = progress::channel();
    let outcome = coordinator.check_and_update(sink).unwrap().await.unwrap();

    assert!(!outcome.updated);
    assert_eq!(outcome.phase, UpdatePhase::Failed);
    assert!(matches!(outcome.error, Some(UpdaterError::ExtractionFailed { .. })));

    assert_eq!(std::fs::read_to_string(&paths.marker).unwrap(), "1");
    assert_eq!(std::fs::read_to_string(paths.scenario.join("index.html")).unwrap(), "old");
    // 스테이징 디렉터리는 정리됨
    assert!(!tmp.path().join("scenario.staging").exists());

    let events = drain(&mut rx);
    assert_well_formed(&events);
    assert!(!percents(&events).contains(&100));
    assert_eq!(events.last(), Some(&UpdateEvent::Completed { updated: false }));
}

#[tokio::test]
async fn test_archive_http_error_reports_status() {
    let tmp = TempDir::new().unwrap();
    let mut repo = MockRepo::new("1", Vec::new());
    repo.archive_status = StatusCode::NOT_FOUND;
    let (addr, hits) = start_mock_repo(repo).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();

    let (sink, mut rx) = progress::channel();
    let outcome = coordinator.check_and_update(sink).unwrap().await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.error, Some(UpdaterError::DownloadFailed { status_code: 404 }));
    assert!(!coordinator.paths().marker.exists());
    assert!(!coordinator.paths().scenario.exists());
    assert_well_formed(&drain(&mut rx));
}

#[tokio::test]
async fn test_version_http_error_fails_check() {
    let tmp = TempDir::new().unwrap();
    let mut repo = MockRepo::new("oops", Vec::new());
    repo.version_status = StatusCode::INTERNAL_SERVER_ERROR;
    let (addr, hits) = start_mock_repo(repo).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();

    let (sink, _rx) = progress::channel();
    let outcome = coordinator.check_and_update(sink).unwrap().await.unwrap();

    assert!(matches!(
        outcome.error,
        Some(UpdaterError::ApiError { status_code: 500, .. })
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_server_is_network_failure() {
    let tmp = TempDir::new().unwrap();
    let config = UpdateConfig {
        version_url: "http://127.0.0.1:9/version.txt".to_string(),
        repo_url: "http://127.0.0.1:9/main.zip".to_string(),
        install_root: Some(tmp.path().to_string_lossy().to_string()),
        request_timeout_secs: 2,
        ..UpdateConfig::default()
    };
    let coordinator = UpdateCoordinator::new(config).unwrap();

    let (sink, mut rx) = progress::channel();
    let outcome = coordinator.check_and_update(sink).unwrap().await.unwrap();

    assert!(!outcome.updated);
    assert!(matches!(
        outcome.error,
        Some(UpdaterError::NetworkError { .. }) | Some(UpdaterError::Timeout { .. })
    ));
    assert_eq!(drain(&mut rx).last(), Some(&UpdateEvent::Completed { updated: false }));
}

#[tokio::test]
async fn test_checksum_mismatch_blocks_install() {
    let tmp = TempDir::new().unwrap();
    let zip = create_scenario_zip(&[("index.html", b"x")]);
    let (addr, _) = start_mock_repo(MockRepo::new("1", zip)).await;
    let config = UpdateConfig {
        archive_sha256: Some("00".repeat(32)),
        ..test_config(addr, &tmp)
    };
    let coordinator = UpdateCoordinator::new(config).unwrap();

    let (sink, _rx) = progress::channel();
    let outcome = coordinator.check_and_update(sink).unwrap().await.unwrap();

    assert!(matches!(outcome.error, Some(UpdaterError::ValidationError { .. })));
    assert!(!coordinator.paths().scenario.exists());
    assert!(!coordinator.paths().marker.exists());
}

// ═══════════════════════════════════════════════════════
// 4. 동시 실행 / 취소
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_concurrent_attempt_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut repo = MockRepo::new("1", create_scenario_zip(&[("index.html", b"x")]));
    repo.version_delay = Duration::from_millis(300);
    let (addr, _) = start_mock_repo(repo).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();

    let (sink, _rx) = progress::channel();
    let first = coordinator.check_and_update(sink.clone()).unwrap();
    assert!(coordinator.is_running());

    let second = coordinator.check_and_update(sink.clone());
    assert!(matches!(second, Err(UpdaterError::AlreadyRunning)));

    assert!(first.await.unwrap().updated);
    assert!(!coordinator.is_running());

    // 완료 후에는 다시 실행 가능
    let third = coordinator.check_and_update(sink).unwrap().await.unwrap();
    assert!(!third.updated);
}

#[tokio::test]
async fn test_cancel_during_check() {
    let tmp = TempDir::new().unwrap();
    let mut repo = MockRepo::new("1", create_scenario_zip(&[("index.html", b"x")]));
    repo.version_delay = Duration::from_millis(300);
    let (addr, hits) = start_mock_repo(repo).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();

    assert!(!coordinator.cancel());

    let (sink, mut rx) = progress::channel();
    let handle = coordinator.check_and_update(sink).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(coordinator.cancel());

    let outcome = handle.await.unwrap();
    assert!(matches!(outcome.error, Some(UpdaterError::Cancelled { .. })));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!coordinator.paths().marker.exists());
    assert_well_formed(&drain(&mut rx));
}

#[tokio::test]
async fn test_cancel_right_after_start_is_not_lost() {
    let tmp = TempDir::new().unwrap();
    let (addr, hits) = start_mock_repo(MockRepo::new("1", create_scenario_zip(&[("index.html", b"x")]))).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();

    let (sink, mut rx) = progress::channel();
    let handle = coordinator.check_and_update(sink).unwrap();
    // 태스크가 한 번도 poll되기 전
    assert!(coordinator.cancel());

    let outcome = handle.await.unwrap();
    assert!(matches!(outcome.error, Some(UpdaterError::Cancelled { .. })));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!coordinator.paths().marker.exists());
    assert_well_formed(&drain(&mut rx));
}

#[tokio::test]
async fn test_retry_from_completion_event_is_accepted() {
    let tmp = TempDir::new().unwrap();
    let (addr, hits) = start_mock_repo(MockRepo::new("1", create_scenario_zip(&[("index.html", b"x")]))).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();

    let (retry_tx, mut retry_rx) = mpsc::unbounded_channel();
    let retried = Arc::new(AtomicBool::new(false));
    let sink = {
        let coordinator = coordinator.clone();
        move |event: UpdateEvent| {
            if let UpdateEvent::Completed { .. } = event {
                if !retried.swap(true, Ordering::SeqCst) {
                    let noop: Arc<dyn ProgressSink> = Arc::new(|_: UpdateEvent| {});
                    let _ = retry_tx.send(coordinator.check_and_update(noop));
                }
            }
        }
    };

    let outcome = coordinator.check_and_update(Arc::new(sink)).unwrap().await.unwrap();
    assert!(outcome.updated);

    let retry = retry_rx.recv().await.unwrap();
    let second = retry.expect("retry from the completion event must start").await.unwrap();
    assert!(!second.updated);
    assert_eq!(second.phase, UpdatePhase::UpToDate);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_sink_still_completes_once() {
    let tmp = TempDir::new().unwrap();
    let (addr, _) = start_mock_repo(MockRepo::new("1", create_scenario_zip(&[("index.html", b"x")]))).await;
    let coordinator = UpdateCoordinator::new(test_config(addr, &tmp)).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = move |event: UpdateEvent| {
        if let UpdateEvent::Progress { .. } = event {
            panic!("sink failure");
        }
        let _ = tx.send(event);
    };

    let outcome = coordinator.check_and_update(Arc::new(sink)).unwrap().await.unwrap();
    assert!(!outcome.updated);
    assert_eq!(outcome.phase, UpdatePhase::Failed);
    assert!(matches!(outcome.error, Some(UpdaterError::Internal { .. })));

    let events = drain(&mut rx);
    assert_eq!(events, vec![UpdateEvent::Completed { updated: false }]);
    assert!(!coordinator.is_running());
    assert!(!coordinator.paths().marker.exists());
}
