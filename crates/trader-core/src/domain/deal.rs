//! 체결(딜) 기록.

use crate::domain::OrderType;
use crate::types::{Money, Price, Volume};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 체결 진입/청산 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealEntry {
    /// 포지션 진입
    In,
    /// 포지션 청산
    Out,
}

/// 체결 발생 원인.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealReason {
    /// 클라이언트 요청
    Client,
    /// 손절 도달
    Sl,
    /// 익절 도달
    Tp,
}

/// 체결 기록.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    /// 체결 티켓
    pub ticket: u64,
    /// 체결을 발생시킨 주문 티켓
    pub order: u64,
    /// 관련 포지션 티켓
    pub position_id: u64,
    /// 거래 심볼
    pub symbol: String,
    /// 체결 방향
    pub deal_type: OrderType,
    /// 진입/청산 구분
    pub entry: DealEntry,
    /// 발생 원인
    pub reason: DealReason,
    /// 체결 수량
    pub volume: Volume,
    /// 체결 가격
    pub price: Price,
    /// 실현손익 (진입 체결은 0)
    pub profit: Money,
    /// 체결 시각
    pub time: DateTime<Utc>,
    /// 전략 식별 번호
    pub magic: u64,
    /// 코멘트
    pub comment: String,
}

impl Deal {
    /// 청산 체결인지 확인합니다.
    pub fn is_exit(&self) -> bool {
        self.entry == DealEntry::Out
    }
}
