use std::path::{Path, PathBuf};

use anyhow::Context;
use eeditor_updater_lib::UpdateConfig;
use serde::Deserialize;

/// `config/global.toml` 전체 설정
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    pub storage: StorageConfig,
    pub updater: UpdateConfig,
    pub ipc: IpcConfig,
    pub network: NetworkConfig,
    pub document: DocumentConfig,
    pub assets: AssetsConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// 애플리케이션 전용 저장소 루트 (버전 마커, 시나리오, 캐시)
    pub root: String,
    /// 파일 브리지 샌드박스 루트. 없으면 `<root>/files`
    pub external_root: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "./data".to_string(),
            external_root: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IpcConfig {
    /// 페이지용 API (브리지, 핸들 기반 문서, 업데이트, 시작 페이지)
    pub listen_addr: String,
    /// 셸 전용 API (임의 경로의 문서 열기/닫기)
    pub shell_listen_addr: String,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:57480".to_string(),
            shell_listen_addr: "127.0.0.1:57481".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub probe_url: String,
    pub probe_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_url: eeditor_updater_lib::NetworkChecker::DEFAULT_PROBE_URL.to_string(),
            probe_timeout_secs: 5,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DocumentConfig {
    pub read_timeout_secs: u64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self { read_timeout_secs: 10 }
    }
}

/// 번들 페이지 위치
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AssetsConfig {
    pub root: String,
    /// 오프라인일 때 여는 페이지
    pub offline_page: String,
    /// 온라인이지만 settings.json에 link가 없을 때 여는 페이지
    pub welcome_page: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: "./assets".to_string(),
            offline_page: "index.html".to_string(),
            welcome_page: "page/hello.html".to_string(),
        }
    }
}

impl GlobalConfig {
    /// 설정 파일을 찾아 로드. 없거나 잘못되면 기본값
    pub fn load() -> Self {
        let Some(path) = find_config_file() else {
            tracing::info!("[Config] No global.toml found, using defaults");
            return Self::default().finalize();
        };

        match Self::load_from(&path) {
            Ok(cfg) => {
                tracing::info!("[Config] Loaded {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!("[Config] {:#}, using defaults", e);
                Self::default().finalize()
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let cfg: Self = toml::from_str(&s)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(cfg.finalize())
    }

    /// 업데이터 설치 루트가 비어 있으면 저장소 루트를 사용
    fn finalize(mut self) -> Self {
        if self.updater.install_root.as_deref().map_or(true, |s| s.trim().is_empty()) {
            self.updater.install_root = Some(self.storage.root.clone());
        }
        self
    }

    pub fn sandbox_root(&self) -> PathBuf {
        match self.storage.external_root.as_deref() {
            Some(ext) if !ext.trim().is_empty() => PathBuf::from(ext),
            _ => PathBuf::from(&self.storage.root).join("files"),
        }
    }

    pub fn assets_root(&self) -> PathBuf {
        PathBuf::from(&self.assets.root)
    }
}

fn find_config_file() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("EEDITOR_CONFIG") {
        let p = PathBuf::from(p);
        if p.exists() {
            return Some(p);
        }
    }

    // 실행 파일 옆 config/global.toml
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join("config").join("global.toml");
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from("config").join("global.toml");
    p.exists().then_some(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GlobalConfig::default().finalize();
        assert_eq!(cfg.updater.install_root.as_deref(), Some("./data"));
        assert_eq!(cfg.sandbox_root(), PathBuf::from("./data").join("files"));
        assert_eq!(cfg.ipc.listen_addr, "127.0.0.1:57480");
        assert_eq!(cfg.ipc.shell_listen_addr, "127.0.0.1:57481");
        assert_eq!(cfg.updater.marker_file, "version.txt");
    }

    #[test]
    fn test_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("global.toml");
        std::fs::write(
            &path,
            r#"
[storage]
root = "/var/lib/eeditor"
external_root = "/sdcard/eeditor"

[updater]
version_url = "http://localhost/version.txt"
version_compare = "semver"

[ipc]
listen_addr = "127.0.0.1:9000"
"#,
        )
        .unwrap();

        let cfg = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(cfg.sandbox_root(), PathBuf::from("/sdcard/eeditor"));
        assert_eq!(cfg.updater.install_root.as_deref(), Some("/var/lib/eeditor"));
        assert_eq!(cfg.updater.version_url, "http://localhost/version.txt");
        assert_eq!(cfg.updater.version_compare, eeditor_updater_lib::VersionCompare::Semver);
        assert_eq!(cfg.updater.scenario_dir, "scenario");
        assert_eq!(cfg.ipc.listen_addr, "127.0.0.1:9000");
        assert_eq!(cfg.ipc.shell_listen_addr, "127.0.0.1:57481");
        assert_eq!(cfg.network.probe_timeout_secs, 5);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config").join("global.toml");
        let cfg = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(cfg, GlobalConfig::default().finalize());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("global.toml");
        std::fs::write(&path, "[storage\nroot = ").unwrap();
        assert!(GlobalConfig::load_from(&path).is_err());
    }
}
