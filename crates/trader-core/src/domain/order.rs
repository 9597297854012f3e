//! 주문 요청과 처리 결과.
//!
//! 이 모듈은 터미널의 주문 계약을 타입으로 정의합니다:
//! - `TradeAction` - 요청 동작 (즉시 체결 / 손절·익절 수정)
//! - `OrderType` - 주문 방향
//! - `TradeRequest` - 주문 요청
//! - `Retcode` - 브로커 결과 코드
//! - `OrderSendResult`, `OrderCheckResult` - 전송/검사 결과
//! - `HistoryOrder` - 처리된 주문 기록

use crate::types::{Money, Price, Volume};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 주문 요청 동작.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    /// 시장가 즉시 체결 (진입 또는 `position` 지정 시 청산)
    Deal,
    /// 오픈 포지션의 손절/익절 수정
    Sltp,
}

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl OrderType {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            OrderType::Buy => OrderType::Sell,
            OrderType::Sell => OrderType::Buy,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Buy => write!(f, "BUY"),
            OrderType::Sell => write!(f, "SELL"),
        }
    }
}

/// 주문 요청.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    /// 요청 동작
    pub action: TradeAction,
    /// 거래 심볼
    pub symbol: String,
    /// 거래 수량 (랏)
    #[serde(default)]
    pub volume: Volume,
    /// 주문 방향
    #[serde(default = "default_order_type")]
    pub order_type: OrderType,
    /// 요청 가격 (0이면 현재가)
    #[serde(default)]
    pub price: Price,
    /// 손절가 (0이면 없음)
    #[serde(default)]
    pub sl: Price,
    /// 익절가 (0이면 없음)
    #[serde(default)]
    pub tp: Price,
    /// 허용 가격 편차 (포인트)
    #[serde(default)]
    pub deviation: u32,
    /// 청산/수정 대상 포지션 티켓
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    /// 전략 식별 번호
    #[serde(default)]
    pub magic: u64,
    /// 주문 코멘트
    #[serde(default)]
    pub comment: String,
}

fn default_order_type() -> OrderType {
    OrderType::Buy
}

impl TradeRequest {
    /// 시장가 매수 요청을 생성합니다.
    pub fn buy(symbol: impl Into<String>, volume: Volume) -> Self {
        Self::deal(symbol, OrderType::Buy, volume)
    }

    /// 시장가 매도 요청을 생성합니다.
    pub fn sell(symbol: impl Into<String>, volume: Volume) -> Self {
        Self::deal(symbol, OrderType::Sell, volume)
    }

    /// 시장가 체결 요청을 생성합니다.
    pub fn deal(symbol: impl Into<String>, order_type: OrderType, volume: Volume) -> Self {
        Self {
            action: TradeAction::Deal,
            symbol: symbol.into(),
            volume,
            order_type,
            price: Decimal::ZERO,
            sl: Decimal::ZERO,
            tp: Decimal::ZERO,
            deviation: 0,
            position: None,
            magic: 0,
            comment: String::new(),
        }
    }

    /// 손절/익절 수정 요청을 생성합니다.
    pub fn modify_stops(symbol: impl Into<String>, position: u64, sl: Price, tp: Price) -> Self {
        Self {
            action: TradeAction::Sltp,
            position: Some(position),
            sl,
            tp,
            ..Self::deal(symbol, OrderType::Buy, Decimal::ZERO)
        }
    }

    /// 요청 가격과 허용 편차를 설정합니다.
    pub fn with_price(mut self, price: Price, deviation: u32) -> Self {
        self.price = price;
        self.deviation = deviation;
        self
    }

    /// 손절/익절을 설정합니다.
    pub fn with_stops(mut self, sl: Price, tp: Price) -> Self {
        self.sl = sl;
        self.tp = tp;
        self
    }

    /// 청산 대상 포지션을 지정합니다.
    pub fn closing(mut self, position: u64) -> Self {
        self.position = Some(position);
        self
    }

    /// 전략 번호를 설정합니다.
    pub fn with_magic(mut self, magic: u64) -> Self {
        self.magic = magic;
        self
    }

    /// 코멘트를 설정합니다.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// 브로커 결과 코드.
///
/// 정수 코드로 직렬화되므로 실거래 터미널의 `retcode` 필드와 호환됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Retcode {
    /// 요청 완료
    Done,
    /// 재호가 (요청 가격 편차 초과)
    Requote,
    /// 잘못된 요청
    Invalid,
    /// 잘못된 수량
    InvalidVolume,
    /// 잘못된 가격
    InvalidPrice,
    /// 잘못된 손절/익절
    InvalidStops,
    /// 거래 불가
    TradeDisabled,
    /// 시장 마감
    MarketClosed,
    /// 증거금 부족
    NoMoney,
    /// 이미 청산된 포지션
    PositionClosed,
    /// 매수만 허용
    LongOnly,
    /// 매도만 허용
    ShortOnly,
    /// 청산만 허용
    CloseOnly,
}

impl Retcode {
    /// 브로커 정수 코드를 반환합니다.
    pub fn code(&self) -> u32 {
        match self {
            Retcode::Requote => 10004,
            Retcode::Done => 10009,
            Retcode::Invalid => 10013,
            Retcode::InvalidVolume => 10014,
            Retcode::InvalidPrice => 10015,
            Retcode::InvalidStops => 10016,
            Retcode::TradeDisabled => 10017,
            Retcode::MarketClosed => 10018,
            Retcode::NoMoney => 10019,
            Retcode::PositionClosed => 10036,
            Retcode::LongOnly => 10042,
            Retcode::ShortOnly => 10043,
            Retcode::CloseOnly => 10044,
        }
    }

    /// 성공 코드인지 확인합니다.
    pub fn is_done(&self) -> bool {
        matches!(self, Retcode::Done)
    }

    /// 사람이 읽을 수 있는 설명.
    pub fn description(&self) -> &'static str {
        match self {
            Retcode::Done => "Request completed",
            Retcode::Requote => "Requote",
            Retcode::Invalid => "Invalid request",
            Retcode::InvalidVolume => "Invalid volume in the request",
            Retcode::InvalidPrice => "Invalid price in the request",
            Retcode::InvalidStops => "Invalid stops in the request",
            Retcode::TradeDisabled => "Trade is disabled",
            Retcode::MarketClosed => "Market is closed",
            Retcode::NoMoney => "There is not enough money to complete the request",
            Retcode::PositionClosed => "Position with the specified identifier has already been closed",
            Retcode::LongOnly => "Only long positions are allowed",
            Retcode::ShortOnly => "Only short positions are allowed",
            Retcode::CloseOnly => "Only position closing is allowed",
        }
    }
}

impl From<Retcode> for u32 {
    fn from(retcode: Retcode) -> Self {
        retcode.code()
    }
}

impl TryFrom<u32> for Retcode {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        let retcode = match code {
            10004 => Retcode::Requote,
            10009 => Retcode::Done,
            10013 => Retcode::Invalid,
            10014 => Retcode::InvalidVolume,
            10015 => Retcode::InvalidPrice,
            10016 => Retcode::InvalidStops,
            10017 => Retcode::TradeDisabled,
            10018 => Retcode::MarketClosed,
            10019 => Retcode::NoMoney,
            10036 => Retcode::PositionClosed,
            10042 => Retcode::LongOnly,
            10043 => Retcode::ShortOnly,
            10044 => Retcode::CloseOnly,
            other => return Err(format!("Unknown retcode: {}", other)),
        };
        Ok(retcode)
    }
}

impl fmt::Display for Retcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

/// `order_send` 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSendResult {
    /// 결과 코드
    pub retcode: Retcode,
    /// 체결 티켓 (실패 시 0)
    pub deal: u64,
    /// 주문 티켓 (실패 시 0)
    pub order: u64,
    /// 체결 수량
    pub volume: Volume,
    /// 체결 가격
    pub price: Price,
    /// 현재 매수 호가
    pub bid: Price,
    /// 현재 매도 호가
    pub ask: Price,
    /// 결과 설명
    pub comment: String,
    /// 원본 요청
    pub request: TradeRequest,
}

impl OrderSendResult {
    /// 상태 변경 없이 거부된 결과를 생성합니다.
    pub fn rejected(
        retcode: Retcode,
        comment: impl Into<String>,
        request: TradeRequest,
        bid: Price,
        ask: Price,
    ) -> Self {
        Self {
            retcode,
            deal: 0,
            order: 0,
            volume: Decimal::ZERO,
            price: Decimal::ZERO,
            bid,
            ask,
            comment: comment.into(),
            request,
        }
    }

    /// 체결 완료 여부.
    pub fn is_done(&self) -> bool {
        self.retcode.is_done()
    }
}

/// `order_check` 결과.
///
/// 계좌 수치는 요청이 체결되었다고 가정한 이후의 예상값입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCheckResult {
    /// 결과 코드 (`Done`이면 성공)
    pub retcode: Retcode,
    /// 체결 후 잔고
    pub balance: Money,
    /// 체결 후 평가자산
    pub equity: Money,
    /// 체결 후 평가손익
    pub profit: Money,
    /// 체결 후 사용 증거금
    pub margin: Money,
    /// 체결 후 여유 증거금
    pub margin_free: Money,
    /// 체결 후 증거금 수준 (%)
    pub margin_level: Decimal,
    /// 결과 설명
    pub comment: String,
    /// 원본 요청
    pub request: TradeRequest,
}

impl OrderCheckResult {
    /// 검사 결과 코드. 성공은 0입니다.
    pub fn code(&self) -> u32 {
        if self.retcode.is_done() {
            0
        } else {
            self.retcode.code()
        }
    }

    /// 검사 통과 여부.
    pub fn is_ok(&self) -> bool {
        self.retcode.is_done()
    }
}

/// 처리 완료된 주문 기록.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOrder {
    /// 주문 티켓
    pub ticket: u64,
    /// 관련 포지션 티켓
    pub position_id: u64,
    /// 거래 심볼
    pub symbol: String,
    /// 주문 방향
    pub order_type: OrderType,
    /// 주문 수량
    pub volume: Volume,
    /// 체결 가격
    pub price: Price,
    /// 처리 시각
    pub time_done: DateTime<Utc>,
    /// 전략 식별 번호
    pub magic: u64,
    /// 코멘트
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_retcode_codes() {
        assert_eq!(Retcode::Done.code(), 10009);
        assert_eq!(Retcode::NoMoney.code(), 10019);
        assert_eq!(Retcode::try_from(10014).unwrap(), Retcode::InvalidVolume);
        assert!(Retcode::try_from(1).is_err());
    }

    #[test]
    fn test_retcode_serializes_as_integer() {
        let json = serde_json::to_string(&Retcode::Done).unwrap();
        assert_eq!(json, "10009");
        let parsed: Retcode = serde_json::from_str("10016").unwrap();
        assert_eq!(parsed, Retcode::InvalidStops);
    }

    #[test]
    fn test_request_builders() {
        let request = TradeRequest::sell("BTCUSD", dec!(0.1))
            .with_stops(dec!(110), dec!(90))
            .closing(7)
            .with_magic(42);
        assert_eq!(request.order_type, OrderType::Sell);
        assert_eq!(request.position, Some(7));
        assert_eq!(request.sl, dec!(110));
        assert_eq!(request.magic, 42);

        let modify = TradeRequest::modify_stops("BTCUSD", 3, dec!(1), dec!(2));
        assert_eq!(modify.action, TradeAction::Sltp);
        assert_eq!(modify.position, Some(3));
    }

    #[test]
    fn test_check_code_success_is_zero() {
        let result = OrderCheckResult {
            retcode: Retcode::Done,
            balance: dec!(100),
            equity: dec!(100),
            profit: dec!(0),
            margin: dec!(0),
            margin_free: dec!(100),
            margin_level: dec!(0),
            comment: "Done".to_string(),
            request: TradeRequest::buy("BTCUSD", dec!(0.01)),
        };
        assert_eq!(result.code(), 0);
        assert!(result.is_ok());
    }
}
