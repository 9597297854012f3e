//! 백테스트 터미널 엔진.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 시뮬레이션 시계: 고정 구간 위를 일정 간격으로 전진하는 커서
//! - 과거 데이터 저장소: 커서 이후 데이터를 숨기는 캔들/틱 조회
//! - 계좌 및 주문 시뮬레이터: 실거래 터미널과 같은 결과 코드 계약
//! - 스냅샷: 세션 일시 정지와 재개
//! - Terminal trait: 실거래/백테스트 공용 인터페이스

pub mod account;
pub mod clock;
pub mod engine;
pub mod error;
pub mod loader;
pub mod report;
pub mod snapshot;
pub mod store;
pub mod terminal;
pub mod trading;

pub use account::AccountSimulator;
pub use clock::{Clock, Cursor, Span};
pub use engine::{BacktestEngine, EngineState};
pub use error::*;
pub use loader::{read_rates_csv, read_ticks_csv};
pub use report::BacktestReport;
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
pub use store::HistoricalDataStore;
pub use terminal::{SharedEngine, Terminal};
pub use trading::{calc_margin, calc_profit, OrderSimulator, TradePlan};
