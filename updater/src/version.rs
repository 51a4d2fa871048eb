//! 버전 마커 비교
//!
//! 기본 비교는 문자열 순서(`lexical`)입니다. `"9"`와 `"10"`처럼 자릿수가
//! 다른 숫자 버전은 잘못 비교되지만, 기존 설치본과의 동작 호환을 위해 유지합니다.
//! 설정에서 `semver`를 선택하면 시맨틱 버전으로 비교합니다.

use std::cmp::Ordering;
use std::fmt;
use serde::{Deserialize, Serialize};

/// 버전 마커 비교 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionCompare {
    /// 단순 문자열 순서
    #[default]
    Lexical,
    /// major.minor.patch 파싱 후 비교, 파싱 실패 시 문자열 순서로 폴백
    Semver,
}

impl VersionCompare {
    /// 업데이트 필요 여부: 로컬 마커가 비어 있거나 원격 마커가 더 크면 true
    pub fn needs_update(self, local: &str, remote: &str) -> bool {
        if local.is_empty() {
            return true;
        }
        match self {
            VersionCompare::Lexical => remote > local,
            VersionCompare::Semver => match (SemVer::parse(remote), SemVer::parse(local)) {
                (Some(r), Some(l)) => r.is_newer_than(&l),
                _ => remote > local,
            },
        }
    }
}

/// 시맨틱 버전 (major.minor.patch[-prerelease])
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
}

impl SemVer {
    /// "v1.2.3" 또는 "1.2.3-beta.1" 형식을 파싱. 단일 숫자("10")도 허용
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);
        let (version_part, prerelease) = match s.find('-') {
            Some(idx) => (&s[..idx], Some(s[idx + 1..].to_string())),
            None => (s, None),
        };

        let mut parts = version_part.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self { major, minor, patch, prerelease })
    }

    /// 현재 버전보다 새로운 버전인지 확인
    pub fn is_newer_than(&self, other: &SemVer) -> bool {
        self > other
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater, // 정식 > 프리릴리스
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
