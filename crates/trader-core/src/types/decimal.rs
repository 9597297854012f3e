//! 정밀한 금융 계산을 위한 Decimal 유틸리티.

use rust_decimal::Decimal;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 거래 수량(랏) 타입.
pub type Volume = Decimal;

/// 계좌 통화 금액 타입.
pub type Money = Decimal;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 지정된 소수점 자릿수로 반올림합니다 (0.5는 0에서 먼 쪽으로).
    fn round_money(&self, dp: u32) -> Decimal;

    /// `step`의 정수배인지 확인합니다. `step`이 0이면 항상 참입니다.
    fn is_multiple_of(&self, step: Decimal) -> bool;
}

impl DecimalExt for Decimal {
    fn round_money(&self, dp: u32) -> Decimal {
        self.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
    }

    fn is_multiple_of(&self, step: Decimal) -> bool {
        if step.is_zero() {
            return true;
        }
        (*self % step).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money() {
        assert_eq!(dec!(1.005).round_money(2), dec!(1.01));
        assert_eq!(dec!(-1.005).round_money(2), dec!(-1.01));
    }

    #[test]
    fn test_is_multiple_of() {
        assert!(dec!(0.30).is_multiple_of(dec!(0.01)));
        assert!(!dec!(0.015).is_multiple_of(dec!(0.01)));
        assert!(dec!(0.015).is_multiple_of(Decimal::ZERO));
    }
}
