//! 공통 에러 타입.
//!
//! 설정 파일 로딩처럼 엔진 밖에서 발생하는 에러를 정의합니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum TraderError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 파일 입출력 에러
    #[error("입출력 에러: {0}")]
    Io(#[from] std::io::Error),
}

/// 공통 Result 타입.
pub type TraderResult<T> = Result<T, TraderError>;

impl From<::config::ConfigError> for TraderError {
    fn from(err: ::config::ConfigError) -> Self {
        TraderError::Config(err.to_string())
    }
}
