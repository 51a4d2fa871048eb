//! 샌드박스 파일 브리지
//!
//! 호스팅된 웹 페이지가 애플리케이션 전용 디렉터리 안에서만 파일을
//! 읽기/쓰기/나열/삭제할 수 있게 합니다. 모든 경로는 [`PathResolver`]를 거치며,
//! 결과는 항상 `{ok, ...}` envelope JSON 문자열로 반환됩니다.
//!
//! 같은 상대 경로에 대한 동시 쓰기는 서로 동기화되지 않습니다 (마지막 쓰기가 남음).

pub mod envelope;
pub mod error;
pub mod path;

use std::fs;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::UNIX_EPOCH;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

pub use envelope::{DirectoryEntry, Encoding, Envelope, Mode, Payload};
pub use error::BridgeError;
pub use path::{PathResolver, ResolvedPath};

/// 읽기 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub content: String,
    pub encoding: Encoding,
}

#[derive(Debug, Clone)]
pub struct FileBridge {
    resolver: PathResolver,
}

impl FileBridge {
    /// 샌드박스 루트를 만들고 브리지 생성
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let resolver = PathResolver::new(root)?;
        tracing::info!("[Bridge] Sandbox root: {}", resolver.base().display());
        Ok(Self { resolver })
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    fn resolve(&self, relative: &str) -> Result<ResolvedPath, BridgeError> {
        self.resolver.resolve(relative).ok_or_else(|| {
            tracing::warn!("[Bridge] Rejected path: {:?}", relative);
            BridgeError::InvalidPath
        })
    }

    fn resolve_entry(&self, relative: &str) -> Result<ResolvedPath, BridgeError> {
        self.resolver.resolve_entry(relative).ok_or_else(|| {
            tracing::warn!("[Bridge] Rejected path: {:?}", relative);
            BridgeError::InvalidPath
        })
    }

    // ═══════════════════════════════════════════════════════
    // 타입 API
    // ═══════════════════════════════════════════════════════

    pub fn read_file(&self, relative: &str, mode: Mode) -> Result<FileContent, BridgeError> {
        let target = self.resolve(relative)?;
        let meta = fs::metadata(target.absolute()).map_err(|_| BridgeError::NotFound)?;
        if meta.is_dir() {
            return Err(BridgeError::IsDirectory);
        }

        let bytes = fs::read(target.absolute())?;
        let content = match mode {
            Mode::Text => FileContent {
                content: String::from_utf8(bytes)?,
                encoding: Encoding::Utf8,
            },
            Mode::Base64 => FileContent {
                content: STANDARD.encode(&bytes),
                encoding: Encoding::Base64,
            },
        };
        tracing::debug!("[Bridge] read {} ({:?})", target.relative(), mode);
        Ok(content)
    }

    /// 같은 디렉터리의 임시 파일에 쓴 뒤 rename
    pub fn write_file(&self, relative: &str, content: &str, mode: Mode) -> Result<(), BridgeError> {
        let target = self.resolve(relative)?;
        if target.is_root() || target.absolute().is_dir() {
            return Err(BridgeError::IsDirectory);
        }

        let bytes = match mode {
            Mode::Text => content.as_bytes().to_vec(),
            Mode::Base64 => {
                let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD.decode(compact)?
            }
        };

        let parent = target.absolute().parent().ok_or(BridgeError::InvalidPath)?;
        fs::create_dir_all(parent).map_err(BridgeError::CreateDirFailed)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".bridge-")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target.absolute()).map_err(|e| BridgeError::Io(e.error))?;

        tracing::debug!("[Bridge] wrote {} ({} bytes)", target.relative(), bytes.len());
        Ok(())
    }

    /// 디렉터리 먼저, 그 안에서는 대소문자 무시 이름순
    pub fn list_files(&self, relative: &str) -> Result<Vec<DirectoryEntry>, BridgeError> {
        let target = self.resolve(relative)?;
        let meta = fs::metadata(target.absolute()).map_err(|_| BridgeError::DirectoryNotFound)?;
        if !meta.is_dir() {
            return Err(BridgeError::NotADirectory);
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(target.absolute())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            // 링크 대상까지 따라간 메타데이터, 실패하면 링크 자체
            let meta = match fs::metadata(entry.path()) {
                Ok(m) => m,
                Err(_) => entry.metadata()?,
            };
            let is_directory = meta.is_dir();

            let relative_path = fs::canonicalize(entry.path())
                .ok()
                .and_then(|p| self.resolver.relative_of(&p))
                .unwrap_or_else(|| join_relative(target.relative(), &name));

            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);

            files.push(DirectoryEntry {
                name,
                relative_path,
                is_directory,
                size: if is_directory { 0 } else { meta.len() },
                modified,
            });
        }

        files.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(files)
    }

    /// 파일 또는 빈 디렉터리 하나만 삭제 (재귀 삭제 없음). 심볼릭 링크는 링크만 삭제
    pub fn delete_file(&self, relative: &str) -> Result<(), BridgeError> {
        let target = self.resolve_entry(relative)?;
        if target.is_root() {
            return Err(BridgeError::InvalidPath);
        }

        let meta = fs::symlink_metadata(target.absolute()).map_err(|_| BridgeError::NotFound)?;
        if meta.is_dir() {
            let mut children = fs::read_dir(target.absolute())?;
            if children.next().is_some() {
                return Err(BridgeError::DeleteFailed("Directory not empty".to_string()));
            }
            fs::remove_dir(target.absolute())
                .map_err(|e| BridgeError::DeleteFailed(e.to_string()))?;
        } else {
            fs::remove_file(target.absolute())
                .map_err(|e| BridgeError::DeleteFailed(e.to_string()))?;
        }

        tracing::info!("[Bridge] deleted {}", target.relative());
        Ok(())
    }

    pub fn base_dir(&self) -> String {
        self.resolver.base().to_string_lossy().to_string()
    }

    // ═══════════════════════════════════════════════════════
    // envelope API (웹 페이지에 노출되는 형태)
    // ═══════════════════════════════════════════════════════

    pub fn read(&self, relative: &str, mode: Option<&str>) -> String {
        self.run("read", || {
            let file = self.read_file(relative, Mode::from_arg(mode))?;
            Ok(Some(Payload::Content { content: file.content, encoding: file.encoding }))
        })
    }

    pub fn write(&self, relative: &str, content: &str, mode: Option<&str>) -> String {
        self.run("write", || {
            self.write_file(relative, content, Mode::from_arg(mode))?;
            Ok(None)
        })
    }

    pub fn list(&self, relative: &str) -> String {
        self.run("list", || Ok(Some(Payload::Listing { files: self.list_files(relative)? })))
    }

    pub fn delete(&self, relative: &str) -> String {
        self.run("delete", || {
            self.delete_file(relative)?;
            Ok(None)
        })
    }

    pub fn base_dir_envelope(&self) -> String {
        self.run("baseDir", || Ok(Some(Payload::BaseDir { base_dir: self.base_dir() })))
    }

    /// 작업을 실행하고 envelope으로 변환. panic도 실패 envelope이 됨
    fn run<F>(&self, op: &str, f: F) -> String
    where
        F: FnOnce() -> Result<Option<Payload>, BridgeError>,
    {
        let result = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(r) => r,
            Err(_) => Err(BridgeError::Internal(format!("{} panicked", op))),
        };
        if let Err(e) = &result {
            tracing::debug!("[Bridge] {} failed: {} ({})", op, e, e.error_code());
        }
        Envelope::from_result(result).into_json()
    }
}

fn join_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
