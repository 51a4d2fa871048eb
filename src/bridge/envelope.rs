//! 브리지 응답 envelope
//!
//! 성공: `{"ok":true, ...payload}` / 실패: `{"ok":false,"error":"..."}`

use serde::{Deserialize, Serialize};

use super::error::BridgeError;

/// read/write 인코딩 모드 (`"base64"`는 대소문자 무시, 나머지는 텍스트)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Text,
    Base64,
}

impl Mode {
    pub fn from_arg(mode: Option<&str>) -> Self {
        match mode {
            Some(m) if m.trim().eq_ignore_ascii_case("base64") => Mode::Base64,
            _ => Mode::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

/// 디렉터리 목록 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    /// 샌드박스 루트 기준 경로 (`/` 구분자)
    pub relative_path: String,
    pub is_directory: bool,
    /// 디렉터리는 0
    pub size: u64,
    /// 수정 시각 (epoch 밀리초)
    pub modified: i64,
}

/// 성공 응답 내용
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Content {
        content: String,
        encoding: Encoding,
    },
    Listing {
        files: Vec<DirectoryEntry>,
    },
    BaseDir {
        #[serde(rename = "baseDir")]
        base_dir: String,
    },
}

#[derive(Debug, Serialize)]
pub struct Envelope {
    ok: bool,
    #[serde(flatten)]
    payload: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Envelope {
    pub fn ok(payload: Option<Payload>) -> Self {
        Self { ok: true, payload, error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { ok: false, payload: None, error: Some(message.into()) }
    }

    pub fn from_result(result: Result<Option<Payload>, BridgeError>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(e) => Self::error(e.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// 직렬화된 envelope. 직렬화 실패 시에도 유효한 실패 envelope을 반환
    pub fn into_json(self) -> String {
        serde_json::to_string(&self)
            .unwrap_or_else(|_| r#"{"ok":false,"error":"unknown"}"#.to_string())
    }
}
