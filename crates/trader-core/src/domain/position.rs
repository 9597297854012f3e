//! 오픈 포지션.

use crate::domain::OrderType;
use crate::types::{Money, Price, Volume};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 오픈 포지션.
///
/// `price_current`와 `profit`은 시뮬레이션 현재 틱 기준으로 갱신되는 값입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 포지션 티켓 (진입 주문 티켓과 동일)
    pub ticket: u64,
    /// 거래 심볼
    pub symbol: String,
    /// 포지션 방향
    pub position_type: OrderType,
    /// 보유 수량
    pub volume: Volume,
    /// 진입 가격
    pub price_open: Price,
    /// 현재 청산 기준 가격
    pub price_current: Price,
    /// 손절가 (0이면 없음)
    pub sl: Price,
    /// 익절가 (0이면 없음)
    pub tp: Price,
    /// 평가손익
    pub profit: Money,
    /// 전략 식별 번호
    pub magic: u64,
    /// 코멘트
    pub comment: String,
    /// 진입 시각
    pub time: DateTime<Utc>,
}

impl Position {
    /// 청산 기준 가격이 손절가에 닿았는지 확인합니다.
    pub fn sl_hit(&self, price: Price) -> bool {
        if self.sl.is_zero() {
            return false;
        }
        match self.position_type {
            OrderType::Buy => price <= self.sl,
            OrderType::Sell => price >= self.sl,
        }
    }

    /// 청산 기준 가격이 익절가에 닿았는지 확인합니다.
    pub fn tp_hit(&self, price: Price) -> bool {
        if self.tp.is_zero() {
            return false;
        }
        match self.position_type {
            OrderType::Buy => price >= self.tp,
            OrderType::Sell => price <= self.tp,
        }
    }

    /// 청산에 필요한 반대 방향.
    pub fn closing_type(&self) -> OrderType {
        self.position_type.opposite()
    }

    /// 평가손익이 이익인지 확인합니다.
    pub fn is_winning(&self) -> bool {
        self.profit > Decimal::ZERO
    }
}
