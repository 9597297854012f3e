//! 심볼 거래 조건.
//!
//! 주문 검증과 증거금/손익 계산에 필요한 심볼 속성을 정의합니다.

use crate::types::{Price, Volume};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 심볼 거래 허용 범위.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeMode {
    /// 거래 불가
    Disabled,
    /// 매수만 가능
    LongOnly,
    /// 매도만 가능
    ShortOnly,
    /// 청산만 가능
    CloseOnly,
    /// 제한 없음
    Full,
}

impl TradeMode {
    /// 신규 진입 자체가 가능한지 확인합니다.
    pub fn allows_open(&self) -> bool {
        !matches!(self, TradeMode::Disabled | TradeMode::CloseOnly)
    }
}

/// 증거금 계산 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcMode {
    /// 외환: 명목가 / 레버리지
    Forex,
    /// 외환 (레버리지 미적용)
    ForexNoLeverage,
    /// CFD: 명목가 전액
    Cfd,
    /// CFD (레버리지 적용)
    CfdLeverage,
}

impl CalcMode {
    /// 레버리지가 적용되는 방식인지 확인합니다.
    pub fn uses_leverage(&self) -> bool {
        matches!(self, CalcMode::Forex | CalcMode::CfdLeverage)
    }
}

impl fmt::Display for CalcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcMode::Forex => write!(f, "forex"),
            CalcMode::ForexNoLeverage => write!(f, "forex_no_leverage"),
            CalcMode::Cfd => write!(f, "cfd"),
            CalcMode::CfdLeverage => write!(f, "cfd_leverage"),
        }
    }
}

/// 심볼 거래 조건.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// 심볼 이름 (예: "BTCUSD")
    pub name: String,
    /// 가격 소수점 자릿수
    #[serde(default = "default_digits")]
    pub digits: u32,
    /// 최소 가격 단위
    #[serde(default = "default_point")]
    pub point: Price,
    /// 1랏당 계약 크기
    #[serde(default = "default_contract_size")]
    pub contract_size: Decimal,
    /// 최소 주문 수량
    #[serde(default = "default_volume_min")]
    pub volume_min: Volume,
    /// 최대 주문 수량
    #[serde(default = "default_volume_max")]
    pub volume_max: Volume,
    /// 주문 수량 단위
    #[serde(default = "default_volume_min")]
    pub volume_step: Volume,
    /// 현재가와 손절/익절 사이 최소 거리 (포인트)
    #[serde(default)]
    pub stops_level: u32,
    /// 거래 허용 범위
    #[serde(default = "default_trade_mode")]
    pub trade_mode: TradeMode,
    /// 증거금 계산 방식
    #[serde(default = "default_calc_mode")]
    pub calc_mode: CalcMode,
    /// 증거금 배율
    #[serde(default = "default_margin_rate")]
    pub margin_rate: Decimal,
}

fn default_digits() -> u32 {
    2
}
fn default_point() -> Price {
    dec!(0.01)
}
fn default_contract_size() -> Decimal {
    Decimal::ONE
}
fn default_volume_min() -> Volume {
    dec!(0.01)
}
fn default_volume_max() -> Volume {
    dec!(100)
}
fn default_trade_mode() -> TradeMode {
    TradeMode::Full
}
fn default_calc_mode() -> CalcMode {
    CalcMode::CfdLeverage
}
fn default_margin_rate() -> Decimal {
    Decimal::ONE
}

impl SymbolInfo {
    /// 기본 거래 조건으로 심볼을 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_uppercase(),
            digits: default_digits(),
            point: default_point(),
            contract_size: default_contract_size(),
            volume_min: default_volume_min(),
            volume_max: default_volume_max(),
            volume_step: default_volume_min(),
            stops_level: 0,
            trade_mode: default_trade_mode(),
            calc_mode: default_calc_mode(),
            margin_rate: default_margin_rate(),
        }
    }

    /// 외환 통화쌍 기본값 (5자리, 10만 계약).
    pub fn forex(name: impl Into<String>) -> Self {
        Self {
            digits: 5,
            point: dec!(0.00001),
            contract_size: dec!(100000),
            calc_mode: CalcMode::Forex,
            ..Self::new(name)
        }
    }

    /// 계약 크기를 설정합니다.
    pub fn with_contract_size(mut self, contract_size: Decimal) -> Self {
        self.contract_size = contract_size;
        self
    }

    /// 거래 허용 범위를 설정합니다.
    pub fn with_trade_mode(mut self, trade_mode: TradeMode) -> Self {
        self.trade_mode = trade_mode;
        self
    }

    /// 증거금 계산 방식을 설정합니다.
    pub fn with_calc_mode(mut self, calc_mode: CalcMode) -> Self {
        self.calc_mode = calc_mode;
        self
    }

    /// 최소 손절/익절 거리를 설정합니다.
    pub fn with_stops_level(mut self, stops_level: u32) -> Self {
        self.stops_level = stops_level;
        self
    }

    /// 포인트 단위 거리를 가격 거리로 변환합니다.
    pub fn points(&self, points: u32) -> Price {
        self.point * Decimal::from(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_defaults() {
        let info = SymbolInfo::new("btcusd");
        assert_eq!(info.name, "BTCUSD");
        assert_eq!(info.trade_mode, TradeMode::Full);
        assert!(info.calc_mode.uses_leverage());
        assert_eq!(info.points(50), dec!(0.50));
    }

    #[test]
    fn test_trade_mode_open() {
        assert!(TradeMode::LongOnly.allows_open());
        assert!(!TradeMode::CloseOnly.allows_open());
        assert!(!TradeMode::Disabled.allows_open());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let info: SymbolInfo = serde_json::from_str(r#"{"name":"EURUSD","digits":5}"#).unwrap();
        assert_eq!(info.digits, 5);
        assert_eq!(info.volume_step, dec!(0.01));
        assert_eq!(info.calc_mode, CalcMode::CfdLeverage);
    }
}
