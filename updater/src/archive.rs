//! 시나리오 아카이브 설치
//!
//! 원격 zip은 모든 내용을 `<repo>-<branch>/` 같은 최상위 폴더 하나로 감싸므로,
//! 각 엔트리 이름의 첫 경로 세그먼트를 제거한 뒤 대상 디렉터리에 씁니다.
//!
//! 설치는 증분이 아닙니다. 형제 디렉터리 `<dest>.staging`을 비운 뒤 그곳에
//! 전부 풀고, 성공했을 때만 대상 디렉터리와 교체합니다. 실패하면 스테이징을
//! 지우고 기존 대상 디렉터리는 그대로 둡니다.

use std::fs;
use std::io::{Read, Seek};
use std::path::{Component as PathComponent, Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::UpdaterError;
use crate::progress::{extract_percent, EXTRACT_START};

/// zip 스트림을 대상 디렉터리에 설치
pub struct ArchiveInstaller {
    destination: PathBuf,
}

impl ArchiveInstaller {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self { destination: destination.into() }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// 압축 해제 중 사용하는 형제 디렉터리
    pub fn staging_dir(&self) -> PathBuf {
        sibling(&self.destination, "staging")
    }

    /// 아카이브를 풀어 대상 디렉터리를 교체하고 대상 경로를 반환
    ///
    /// `on_progress`는 파일 엔트리 하나를 쓸 때마다 50–95 구간 값으로 호출됩니다.
    pub fn install<R, F>(
        &self,
        source: R,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, UpdaterError>
    where
        R: Read + Seek,
        F: Fn(u8),
    {
        let staging = self.staging_dir();
        reset_dir(&staging)?;

        match self.extract_into(source, &staging, &on_progress, cancel) {
            Ok(count) => {
                self.swap_into_place(&staging)?;
                tracing::info!(
                    "[Installer] Installed {} files into {}",
                    count,
                    self.destination.display()
                );
                Ok(self.destination.clone())
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    tracing::warn!(
                        "[Installer] Failed to remove staging dir {}: {}",
                        staging.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    fn extract_into<R, F>(
        &self,
        source: R,
        staging: &Path,
        on_progress: &F,
        cancel: &CancellationToken,
    ) -> Result<u64, UpdaterError>
    where
        R: Read + Seek,
        F: Fn(u8),
    {
        let mut archive = zip::ZipArchive::new(source).map_err(|e| UpdaterError::ExtractionFailed {
            entry: None,
            message: e.to_string(),
        })?;

        // 디렉터리 엔트리까지 포함한 전체 개수가 분모
        let total = (archive.len() as u64).max(1);
        on_progress(EXTRACT_START);

        let mut extracted = 0u64;
        for i in 0..archive.len() {
            if cancel.is_cancelled() {
                return Err(UpdaterError::Cancelled { phase: "extracting".to_string() });
            }

            let mut entry = archive.by_index(i).map_err(|e| UpdaterError::ExtractionFailed {
                entry: None,
                message: e.to_string(),
            })?;
            if entry.is_dir() {
                continue;
            }

            let name = entry.name().to_string();
            let relative = entry_relative_path(&name).ok_or_else(|| UpdaterError::ExtractionFailed {
                entry: Some(name.clone()),
                message: "entry path escapes the destination".to_string(),
            })?;
            let out_path = staging.join(&relative);

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| UpdaterError::from_io(&e, "create directory", parent))?;
            }
            let mut outfile = fs::File::create(&out_path)
                .map_err(|e| UpdaterError::from_io(&e, "create file", &out_path))?;
            std::io::copy(&mut entry, &mut outfile).map_err(|e| UpdaterError::ExtractionFailed {
                entry: Some(name.clone()),
                message: e.to_string(),
            })?;

            extracted += 1;
            on_progress(extract_percent(extracted, total));
        }

        Ok(extracted)
    }

    /// 스테이징을 대상 위치로 교체. 기존 대상은 `<dest>.previous`로 옮긴 뒤 삭제
    fn swap_into_place(&self, staging: &Path) -> Result<(), UpdaterError> {
        let previous = sibling(&self.destination, "previous");
        if previous.exists() {
            fs::remove_dir_all(&previous)
                .map_err(|e| UpdaterError::from_io(&e, "remove previous install", &previous))?;
        }

        let had_previous = self.destination.exists();
        if had_previous {
            fs::rename(&self.destination, &previous)
                .map_err(|e| UpdaterError::from_io(&e, "move previous install", &self.destination))?;
        }

        if let Err(e) = fs::rename(staging, &self.destination) {
            if had_previous {
                // 교체 실패 시 이전 설치본 복원
                let _ = fs::rename(&previous, &self.destination);
            }
            return Err(UpdaterError::from_io(&e, "activate staged install", staging));
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&previous) {
                tracing::warn!("[Installer] Failed to remove {}: {}", previous.display(), e);
            }
        }
        Ok(())
    }
}

/// 첫 세그먼트를 제거한 안전한 상대 경로. 대상 밖을 가리키면 None
pub fn entry_relative_path(name: &str) -> Option<PathBuf> {
    let stripped = match name.find('/') {
        Some(idx) => &name[idx + 1..],
        None => name,
    };

    let mut out = PathBuf::new();
    for component in Path::new(stripped).components() {
        match component {
            PathComponent::Normal(part) => out.push(part),
            PathComponent::CurDir => {}
            PathComponent::ParentDir | PathComponent::RootDir | PathComponent::Prefix(_) => {
                return None;
            }
        }
    }

    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "scenario".to_string());
    dir.with_file_name(format!("{}.{}", name, suffix))
}

fn reset_dir(dir: &Path) -> Result<(), UpdaterError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| UpdaterError::from_io(&e, "clear directory", dir))?;
    }
    fs::create_dir_all(dir).map_err(|e| UpdaterError::from_io(&e, "create directory", dir))
}
