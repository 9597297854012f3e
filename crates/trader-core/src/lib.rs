//! # Trader Core
//!
//! 백테스트 터미널의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! - 시장 데이터 (캔들, 틱)
//! - 심볼 거래 조건
//! - 주문 요청, 결과 코드, 포지션, 체결 기록
//! - 계좌 조회 모델
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use self::config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
