//! 백테스트 엔진 에러 타입.
//!
//! 브로커형 실패(증거금 부족, 거래 불가 등)는 에러가 아니라 결과 객체의
//! `Retcode`로 보고됩니다. 여기에는 호출자가 입력을 고쳐야 하는 경우만 있습니다.

use chrono::{DateTime, Utc};
use thiserror::Error;
use trader_core::Timeframe;

/// 백테스트 엔진 에러.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// 잘못된 시뮬레이션 기간
    #[error("Invalid span: {0}")]
    InvalidSpan(String),

    /// `setup_account` 이전의 작업
    #[error("Engine not initialized: call setup_account first")]
    NotInitialized,

    /// 종료된 세션에 대한 작업
    #[error("Backtest session finished at {0}")]
    SessionFinished(DateTime<Utc>),

    /// 잘못된 입금/출금 금액
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// 잘못된 형식의 주문 요청
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 현재 커서 이전 데이터 부족
    #[error("Insufficient data for {symbol} {timeframe}: requested {requested}, available {available}")]
    InsufficientData {
        symbol: String,
        timeframe: Timeframe,
        requested: usize,
        available: usize,
    },

    /// 로드되지 않은 데이터 시리즈
    #[error("No data loaded for {0}")]
    NoData(String),

    /// 등록되지 않은 심볼
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// 스냅샷 파일 입출력 에러
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// 지원하지 않는 스냅샷 형식
    #[error("Unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },

    /// 직렬화 에러
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV 파싱 에러
    #[error("CSV error: {0}")]
    Csv(String),
}

/// 백테스트 작업을 위한 Result 타입.
pub type BacktestResult<T> = Result<T, BacktestError>;

impl BacktestError {
    /// 시뮬레이션을 더 진행할 수 없는 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BacktestError::SessionFinished(_)
                | BacktestError::InvalidSpan(_)
                | BacktestError::Persistence(_)
                | BacktestError::SnapshotVersion { .. }
                | BacktestError::Serialization(_)
        )
    }

    /// 호출자가 입력을 고쳐 다시 시도하면 되는 에러인지 확인.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BacktestError::InvalidAmount(_)
                | BacktestError::InvalidRequest(_)
                | BacktestError::UnknownSymbol(_)
        )
    }
}

impl From<csv::Error> for BacktestError {
    fn from(err: csv::Error) -> Self {
        BacktestError::Csv(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(BacktestError::SessionFinished(Utc::now()).is_fatal());
        assert!(!BacktestError::NotInitialized.is_fatal());
        assert!(BacktestError::InvalidAmount("-5".into()).is_validation());
        assert!(!BacktestError::NoData("BTCUSD M1".into()).is_validation());
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = BacktestError::InsufficientData {
            symbol: "BTCUSD".into(),
            timeframe: Timeframe::M1,
            requested: 10,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data for BTCUSD M1: requested 10, available 3"
        );
    }
}
