//! 백테스트 설정 관리.
//!
//! TOML 파일을 읽고 `BACKTEST__` 접두사 환경 변수로 덮어씁니다.
//!
//! ```toml
//! [span]
//! start = "2024-02-01T00:00:00Z"
//! end = "2024-02-07T00:00:00Z"
//! speed = 60
//!
//! [account]
//! balance = 100
//! leverage = 100
//!
//! [[symbols]]
//! name = "BTCUSD"
//!
//! [[data]]
//! symbol = "BTCUSD"
//! kind = "rates"
//! timeframe = "M1"
//! path = "data/btcusd_m1.csv"
//! ```

use crate::domain::SymbolInfo;
use crate::error::{TraderError, TraderResult};
use crate::types::{Money, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 백테스트 전체 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BacktestConfig {
    /// 시뮬레이션 기간
    pub span: SpanConfig,
    /// 초기 계좌
    pub account: AccountConfig,
    /// 심볼 거래 조건
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
    /// 과거 데이터 소스
    #[serde(default)]
    pub data: Vec<DataSourceConfig>,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 스냅샷 설정
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// 시뮬레이션 기간 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpanConfig {
    /// 시작 시각 (포함)
    pub start: DateTime<Utc>,
    /// 종료 시각 (제외)
    pub end: DateTime<Utc>,
    /// 한 단계당 시뮬레이션 초
    #[serde(default = "default_speed")]
    pub speed: u32,
}

fn default_speed() -> u32 {
    60
}

/// 초기 계좌 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    /// 초기 잔고
    pub balance: Money,
    /// 레버리지
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// 계좌 통화
    #[serde(default = "default_currency")]
    pub currency: String,
    /// 계좌 번호
    #[serde(default)]
    pub login: u64,
}

fn default_leverage() -> u32 {
    100
}
fn default_currency() -> String {
    "USD".to_string()
}

/// 데이터 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// OHLCV 캔들
    Rates,
    /// 호가 틱
    Ticks,
}

/// CSV 데이터 소스.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataSourceConfig {
    /// 심볼 이름
    pub symbol: String,
    /// 데이터 종류
    pub kind: DataKind,
    /// 타임프레임 (rates에 필수)
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    /// CSV 파일 경로
    pub path: PathBuf,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
    /// `order_send` 등 span 진입/종료 기록
    #[serde(default)]
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            span_events: false,
        }
    }
}

/// 스냅샷 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SnapshotConfig {
    /// 스냅샷 파일 경로
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// N 단계마다 저장 (0이면 종료 시에만)
    #[serde(default)]
    pub every_steps: u64,
}

impl BacktestConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> TraderResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let builder = ::config::Config::builder()
            .add_source(::config::File::from_str(&content, ::config::FileFormat::Toml))
            .add_source(
                ::config::Environment::with_prefix("BACKTEST")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 로드합니다.
    pub fn from_toml_str(content: &str) -> TraderResult<Self> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::File::from_str(content, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 값의 일관성을 검사합니다.
    pub fn validate(&self) -> TraderResult<()> {
        if self.span.start >= self.span.end {
            return Err(TraderError::Config(format!(
                "span.start ({}) must be before span.end ({})",
                self.span.start, self.span.end
            )));
        }
        if self.span.speed == 0 {
            return Err(TraderError::Config("span.speed must be positive".into()));
        }
        if self.account.balance.is_sign_negative() {
            return Err(TraderError::Config("account.balance must not be negative".into()));
        }
        if self.account.leverage == 0 {
            return Err(TraderError::Config("account.leverage must be positive".into()));
        }

        for source in &self.data {
            if source.kind == DataKind::Rates && source.timeframe.is_none() {
                return Err(TraderError::Config(format!(
                    "rates source for {} requires a timeframe",
                    source.symbol
                )));
            }
            if !self
                .symbols
                .iter()
                .any(|s| s.name.eq_ignore_ascii_case(&source.symbol))
            {
                return Err(TraderError::Config(format!(
                    "data source references unknown symbol {}",
                    source.symbol
                )));
            }
        }

        Ok(())
    }
}
