//! 파일 브리지 에러 - `Display` 텍스트가 그대로 envelope의 `error` 문자열이 됩니다.

/// 브리지 작업 중 발생할 수 있는 에러 유형
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("Invalid path or access denied")]
    InvalidPath,

    #[error("File not found")]
    NotFound,

    #[error("Directory not found")]
    DirectoryNotFound,

    #[error("Path is a directory")]
    IsDirectory,

    #[error("Path is not a directory")]
    NotADirectory,

    #[error("Invalid base64 content: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("File is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Cannot create directories")]
    CreateDirFailed(#[source] std::io::Error),

    #[error("Cannot delete file: {0}")]
    DeleteFailed(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Internal bridge error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// 머신 리더블 에러 코드
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPath => "INVALID_PATH",
            Self::NotFound | Self::DirectoryNotFound => "NOT_FOUND",
            Self::IsDirectory => "IS_DIRECTORY",
            Self::NotADirectory => "NOT_A_DIRECTORY",
            Self::InvalidBase64(_) | Self::InvalidUtf8(_) => "DECODE_FAILURE",
            Self::CreateDirFailed(_) | Self::Io(_) => "IO_FAILURE",
            Self::DeleteFailed(_) => "DELETE_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_page_expectations() {
        assert_eq!(BridgeError::InvalidPath.to_string(), "Invalid path or access denied");
        assert_eq!(BridgeError::NotFound.to_string(), "File not found");
        assert_eq!(BridgeError::NotADirectory.to_string(), "Path is not a directory");
        assert_eq!(BridgeError::NotFound.error_code(), BridgeError::DirectoryNotFound.error_code());
    }
}
