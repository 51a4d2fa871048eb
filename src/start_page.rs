//! 시작 페이지 선택
//!
//! - 오프라인: 번들 오프라인 페이지
//! - 온라인: 샌드박스의 `settings.json`에 `link`가 있으면 그 URL, 없으면 환영 페이지

use std::path::PathBuf;

use eeditor_updater_lib::NetworkChecker;
use serde::Serialize;
use serde_json::Value;

use crate::bridge::FileBridge;
use crate::config::AssetsConfig;

/// 사용자 설정 파일 (샌드박스 루트 기준)
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum StartPage {
    /// 번들 에셋 파일
    Bundled(PathBuf),
    /// settings.json의 link
    Remote(String),
}

/// 연결 상태와 settings.json 읽기 결과(브리지 envelope)로 시작 페이지 결정
pub fn choose(online: bool, settings_envelope: Option<&str>, assets: &AssetsConfig) -> StartPage {
    let root = PathBuf::from(&assets.root);
    if !online {
        tracing::info!("[StartPage] Offline, opening {}", assets.offline_page);
        return StartPage::Bundled(root.join(&assets.offline_page));
    }

    match settings_envelope.and_then(settings_body).and_then(|body| link_from(&body)) {
        Some(link) => {
            tracing::info!("[StartPage] Using link from settings: {}", link);
            StartPage::Remote(link)
        }
        None => {
            tracing::info!("[StartPage] No link in settings, opening {}", assets.welcome_page);
            StartPage::Bundled(root.join(&assets.welcome_page))
        }
    }
}

/// 연결 확인 후 브리지로 settings.json을 읽어 결정
pub async fn resolve(bridge: &FileBridge, checker: &NetworkChecker, assets: &AssetsConfig) -> StartPage {
    let online = checker.check_connectivity().await;
    let settings = if online {
        let bridge = bridge.clone();
        tokio::task::spawn_blocking(move || bridge.read(SETTINGS_FILE, Some("text")))
            .await
            .ok()
    } else {
        None
    };
    choose(online, settings.as_deref(), assets)
}

/// 성공 envelope이면 `content`, 아니면 None
fn settings_body(envelope: &str) -> Option<String> {
    let v: Value = serde_json::from_str(envelope.trim()).ok()?;
    if v.get("ok").and_then(Value::as_bool) != Some(true) {
        tracing::debug!("[StartPage] settings.json unavailable: {}", v["error"]);
        return None;
    }
    v.get("content").and_then(Value::as_str).map(str::to_string)
}

fn link_from(body: &str) -> Option<String> {
    let trimmed = body.trim().trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(settings) => settings
            .get("link")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        Err(e) => {
            tracing::warn!("[StartPage] settings.json is not valid JSON: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Mode;

    fn assets() -> AssetsConfig {
        AssetsConfig::default()
    }

    fn envelope_for(body: &str) -> String {
        let tmp = tempfile::tempdir().unwrap();
        let bridge = FileBridge::new(tmp.path()).unwrap();
        bridge.write_file(SETTINGS_FILE, body, Mode::Text).unwrap();
        bridge.read(SETTINGS_FILE, Some("text"))
    }

    #[test]
    fn offline_uses_offline_page() {
        let env = envelope_for(r#"{"link":"https://example.com"}"#);
        assert_eq!(
            choose(false, Some(&env), &assets()),
            StartPage::Bundled(PathBuf::from("./assets").join("index.html"))
        );
    }

    #[test]
    fn online_with_link() {
        let env = envelope_for(r#"{"link":"https://example.com/app"}"#);
        assert_eq!(
            choose(true, Some(&env), &assets()),
            StartPage::Remote("https://example.com/app".into())
        );
    }

    #[test]
    fn bom_is_stripped() {
        let env = envelope_for("\u{feff}  {\"link\": \"https://bom.example\"}\n");
        assert_eq!(
            choose(true, Some(&env), &assets()),
            StartPage::Remote("https://bom.example".into())
        );
    }

    #[test]
    fn online_without_usable_link_uses_welcome_page() {
        let welcome = StartPage::Bundled(PathBuf::from("./assets").join("page/hello.html"));
        for body in [r#"{"theme":"dark"}"#, r#"{"link":""}"#, r#"{"link":42}"#, "not json", ""] {
            let env = envelope_for(body);
            assert_eq!(choose(true, Some(&env), &assets()), welcome, "body: {:?}", body);
        }
        assert_eq!(choose(true, None, &assets()), welcome);
        assert_eq!(
            choose(true, Some(r#"{"ok":false,"error":"File not found"}"#), &assets()),
            welcome
        );
    }

    #[test]
    fn serializes_kind_and_target() {
        let v = serde_json::to_value(StartPage::Remote("https://x".into())).unwrap();
        assert_eq!(v, serde_json::json!({"kind": "remote", "target": "https://x"}));
    }

    #[tokio::test]
    async fn unreachable_probe_means_offline() {
        let tmp = tempfile::tempdir().unwrap();
        let bridge = FileBridge::new(tmp.path()).unwrap();
        bridge
            .write_file(SETTINGS_FILE, r#"{"link":"https://example.com"}"#, Mode::Text)
            .unwrap();
        let checker = NetworkChecker::with_endpoints(
            vec!["http://127.0.0.1:9/".to_string()],
            std::time::Duration::from_millis(500),
        );
        let page = resolve(&bridge, &checker, &assets()).await;
        assert_eq!(page, StartPage::Bundled(PathBuf::from("./assets").join("index.html")));
    }
}
