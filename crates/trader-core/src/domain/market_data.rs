//! 시장 데이터 타입.
//!
//! - `Rate` - OHLCV 캔들스틱 (터미널의 rates 배열 한 행)
//! - `Tick` - 호가 틱

use crate::types::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들스틱 데이터.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// 캔들 시작 시간
    pub time: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 틱 거래량
    pub tick_volume: u64,
    /// 스프레드 (포인트)
    #[serde(default)]
    pub spread: u32,
    /// 실거래량
    #[serde(default)]
    pub real_volume: u64,
}

impl Rate {
    /// 새 캔들을 생성합니다.
    pub fn new(
        time: DateTime<Utc>,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        tick_volume: u64,
    ) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            tick_volume,
            spread: 0,
            real_volume: 0,
        }
    }

    /// 스프레드를 설정합니다.
    pub fn with_spread(mut self, spread: u32) -> Self {
        self.spread = spread;
        self
    }

    /// 캔들 범위(고가 - 저가)를 반환합니다.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// 양봉(종가 > 시가)인지 확인합니다.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// 호가 틱.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// 틱 시각
    pub time: DateTime<Utc>,
    /// 매수 호가
    pub bid: Price,
    /// 매도 호가
    pub ask: Price,
    /// 최근 체결가
    #[serde(default)]
    pub last: Price,
    /// 거래량
    #[serde(default)]
    pub volume: u64,
}

impl Tick {
    /// 새 틱을 생성합니다.
    pub fn new(time: DateTime<Utc>, bid: Price, ask: Price) -> Self {
        Self {
            time,
            bid,
            ask,
            last: Decimal::ZERO,
            volume: 0,
        }
    }

    /// 스프레드(ask - bid)를 반환합니다.
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// 중간 가격을 반환합니다.
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_spread() {
        let tick = Tick::new(Utc::now(), dec!(100.0), dec!(100.5));
        assert_eq!(tick.spread(), dec!(0.5));
        assert_eq!(tick.mid(), dec!(100.25));
    }

    #[test]
    fn test_rate_range() {
        let rate = Rate::new(Utc::now(), dec!(10), dec!(12), dec!(9), dec!(11), 5);
        assert_eq!(rate.range(), dec!(3));
        assert!(rate.is_bullish());
    }
}
