//! 업데이트 진행률 모델
//!
//! 0–100 하나의 스케일을 구간으로 나눠 사용합니다 (UI가 이 구간에 의존):
//! - 0–5: 버전 확인
//! - 5–45: 아카이브 다운로드 (수신 바이트 / Content-Length)
//! - 50–95: 압축 해제 (해제한 파일 수 / 전체 엔트리 수)
//! - 100: 완료 (성공 또는 업데이트 불필요)
//!
//! 진행률은 감소하지 않으며, 시도마다 `Completed` 이벤트가 정확히 한 번 전달됩니다.

use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub const CHECK_START: u8 = 0;
pub const DOWNLOAD_START: u8 = 5;
pub const DOWNLOAD_END: u8 = 45;
pub const EXTRACT_START: u8 = 50;
pub const EXTRACT_SPAN: u64 = 45;
pub const COMPLETE: u8 = 100;

/// Content-Length가 없을 때 가정하는 아카이브 크기
pub const ASSUMED_CONTENT_LENGTH: u64 = 1_000_000;

/// 호출자에게 전달되는 이벤트
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UpdateEvent {
    Progress { percent: u8 },
    Completed { updated: bool },
}

/// 진행률 수신자. 어느 스레드에서든 호출될 수 있음
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: UpdateEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(UpdateEvent) + Send + Sync,
{
    fn emit(&self, event: UpdateEvent) {
        self(event)
    }
}

/// 채널 기반 수신자 생성. 수신 측이 닫혀도 시도는 계속됨
pub fn channel() -> (Arc<dyn ProgressSink>, mpsc::UnboundedReceiver<UpdateEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = move |event: UpdateEvent| {
        let _ = tx.send(event);
    };
    (Arc::new(sink), rx)
}

/// 다운로드 구간 진행률: 5 + received * 40 / total, 45에서 포화
pub fn download_percent(received: u64, total: u64) -> u8 {
    let total = total.max(1);
    let span = (DOWNLOAD_END - DOWNLOAD_START) as u64;
    let step = received.saturating_mul(span) / total;
    (DOWNLOAD_START as u64 + step).min(DOWNLOAD_END as u64) as u8
}

/// 압축 해제 구간 진행률: 50 + extracted * 45 / max(total, 1)
pub fn extract_percent(extracted: u64, total: u64) -> u8 {
    let step = extracted.saturating_mul(EXTRACT_SPAN) / total.max(1);
    (EXTRACT_START as u64 + step).min(EXTRACT_START as u64 + EXTRACT_SPAN) as u8
}

/// 한 번의 시도에 대한 진행률 보고기
///
/// 이전 값 이하의 진행률은 버리고, 100은 `finish`에서만 전달합니다.
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    last: AtomicI16,
    finished: AtomicBool,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            last: AtomicI16::new(-1),
            finished: AtomicBool::new(false),
        }
    }

    /// 진행률 보고 (99 이하로 제한)
    pub fn report(&self, percent: u8) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        let percent = percent.min(COMPLETE - 1) as i16;
        let prev = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > prev {
            self.sink.emit(UpdateEvent::Progress { percent: percent as u8 });
        }
    }

    /// 마지막 보고 값
    pub fn last(&self) -> Option<u8> {
        let v = self.last.load(Ordering::SeqCst);
        (v >= 0).then_some(v as u8)
    }

    /// 시도 종료. `full`이면 100을 먼저 보내고 완료 이벤트를 한 번만 전달
    pub fn finish(&self, updated: bool, full: bool) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        if full {
            self.last.store(COMPLETE as i16, Ordering::SeqCst);
            self.sink.emit(UpdateEvent::Progress { percent: COMPLETE });
        }
        self.sink.emit(UpdateEvent::Completed { updated });
    }
}
