//! 계좌 조회 모델.

use crate::types::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 계좌 정보.
///
/// `equity`, `margin_free`, `margin_level`은 항상 `balance`, `profit`, `margin`에서
/// 계산된 값입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// 계좌 번호
    pub login: u64,
    /// 계좌 통화
    pub currency: String,
    /// 레버리지
    pub leverage: u32,
    /// 잔고
    pub balance: Money,
    /// 평가자산 (balance + profit)
    pub equity: Money,
    /// 사용 증거금
    pub margin: Money,
    /// 여유 증거금 (equity - margin)
    pub margin_free: Money,
    /// 증거금 수준 (%, margin이 0이면 0)
    pub margin_level: Decimal,
    /// 평가손익
    pub profit: Money,
}

impl AccountInfo {
    /// 저장 값에서 파생 값을 계산해 계좌 정보를 만듭니다.
    pub fn derive(
        login: u64,
        currency: impl Into<String>,
        leverage: u32,
        balance: Money,
        profit: Money,
        margin: Money,
    ) -> Self {
        let equity = balance + profit;
        let margin_free = equity - margin;
        let margin_level = if margin > Decimal::ZERO {
            Decimal::ONE_HUNDRED * equity / margin
        } else {
            Decimal::ZERO
        };

        Self {
            login,
            currency: currency.into(),
            leverage,
            balance,
            equity,
            margin,
            margin_free,
            margin_level,
            profit,
        }
    }
}
