//! 샌드박스 경로 해석
//!
//! 호출자가 준 상대 경로를 샌드박스 루트에 붙여 정규화하고, 결과가 루트 밖이면
//! 거부합니다. 존재하는 구성 요소는 `canonicalize`로 심볼릭 링크까지 풀고,
//! 아직 없는 구성 요소(쓰기 대상)는 어휘적으로 이어 붙입니다.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// 검증을 통과한 절대 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative: String,
}

impl ResolvedPath {
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// 루트 기준 경로 (`/` 구분자, 루트 자신은 빈 문자열)
    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }
}

/// 고정된 샌드박스 루트에 대한 경로 검증기
#[derive(Debug, Clone)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    /// 루트 디렉터리를 만들고 정규화된 경로를 한 번만 계산
    pub fn new(base: impl AsRef<Path>) -> io::Result<Self> {
        let base = base.as_ref();
        fs::create_dir_all(base)?;
        Ok(Self { base: fs::canonicalize(base)? })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// `\` → `/`, 앞쪽 `/` 제거
    pub fn normalize(relative: &str) -> String {
        relative.replace('\\', "/").trim_start_matches('/').to_string()
    }

    /// 상대 경로 해석. 루트 밖이거나 정규화에 실패하면 None
    pub fn resolve(&self, relative: &str) -> Option<ResolvedPath> {
        self.walk(relative, true)
    }

    /// 마지막 구성 요소는 풀지 않고 해석 (링크 자체를 가리킴)
    ///
    /// 부모까지만 `canonicalize`로 검사하므로 삭제처럼 항목 자체에 작용하는
    /// 연산이 심볼릭 링크의 대상 대신 링크를 다룹니다.
    pub fn resolve_entry(&self, relative: &str) -> Option<ResolvedPath> {
        self.walk(relative, false)
    }

    fn walk(&self, relative: &str, follow_last: bool) -> Option<ResolvedPath> {
        let normalized = Self::normalize(relative);
        let components: Vec<Component> = Path::new(&normalized).components().collect();
        let last = components.len().checked_sub(1);
        let mut current = self.base.clone();

        for (i, component) in components.into_iter().enumerate() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    current.pop();
                }
                Component::Normal(name) if !follow_last && Some(i) == last => {
                    current.push(name);
                }
                Component::Normal(name) => {
                    let candidate = current.join(name);
                    current = match fs::symlink_metadata(&candidate) {
                        // 깨진 심볼릭 링크는 canonicalize 실패로 거부
                        Ok(_) => fs::canonicalize(&candidate).ok()?,
                        Err(_) => candidate,
                    };
                }
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        let relative = self.relative_of(&current)?;
        Some(ResolvedPath { absolute: current, relative })
    }

    /// 절대 경로의 루트 기준 표현. 루트 밖이면 None
    ///
    /// `Path::starts_with`는 구성 요소 단위로 비교하므로 `/a/b`가 `/a/bc`와
    /// 일치하지 않습니다.
    pub fn relative_of(&self, absolute: &Path) -> Option<String> {
        let rest = absolute.strip_prefix(&self.base).ok()?;
        let parts: Vec<String> = rest
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }
}
