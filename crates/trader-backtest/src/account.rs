//! 계좌 시뮬레이터.
//!
//! 저장 값은 `balance`, `profit`, `margin` 세 가지뿐이고, 나머지 수치는
//! [`AccountInfo::derive`]로 조회 시점에 계산합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use trader_core::{AccountInfo, Money};

use crate::error::{BacktestError, BacktestResult};

/// 시뮬레이션 계좌.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSimulator {
    login: u64,
    currency: String,
    leverage: u32,
    balance: Money,
    profit: Money,
    margin: Money,
    /// 입금 누계 (setup 포함)
    deposited: Money,
    /// 출금 누계
    withdrawn: Money,
    initialized: bool,
}

impl Default for AccountSimulator {
    fn default() -> Self {
        Self::new(0, "USD", 100)
    }
}

impl AccountSimulator {
    /// 초기화되지 않은 계좌를 생성합니다.
    pub fn new(login: u64, currency: impl Into<String>, leverage: u32) -> Self {
        Self {
            login,
            currency: currency.into(),
            leverage,
            balance: Decimal::ZERO,
            profit: Decimal::ZERO,
            margin: Decimal::ZERO,
            deposited: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
            initialized: false,
        }
    }

    /// 시작 잔고로 계좌를 초기화합니다. 손익과 증거금은 0이 됩니다.
    pub fn setup_account(&mut self, balance: Money) -> BacktestResult<()> {
        if balance < Decimal::ZERO {
            return Err(BacktestError::InvalidAmount(format!(
                "initial balance must not be negative: {}",
                balance
            )));
        }

        self.balance = balance;
        self.profit = Decimal::ZERO;
        self.margin = Decimal::ZERO;
        self.deposited = balance;
        self.withdrawn = Decimal::ZERO;
        self.initialized = true;

        info!(login = self.login, balance = %balance, currency = %self.currency, "계좌 초기화");
        Ok(())
    }

    /// 입금합니다.
    pub fn deposit(&mut self, amount: Money) -> BacktestResult<()> {
        self.ensure_initialized()?;
        if amount <= Decimal::ZERO {
            return Err(BacktestError::InvalidAmount(format!(
                "deposit must be positive: {}",
                amount
            )));
        }

        self.balance += amount;
        self.deposited += amount;
        debug!(amount = %amount, balance = %self.balance, "입금");
        Ok(())
    }

    /// 출금합니다. 잔고가 음수가 되면 실패하며 상태는 바뀌지 않습니다.
    pub fn withdraw(&mut self, amount: Money) -> BacktestResult<()> {
        self.ensure_initialized()?;
        if amount <= Decimal::ZERO {
            return Err(BacktestError::InvalidAmount(format!(
                "withdrawal must be positive: {}",
                amount
            )));
        }
        if amount > self.balance {
            return Err(BacktestError::InvalidAmount(format!(
                "withdrawal {} exceeds balance {}",
                amount, self.balance
            )));
        }

        self.balance -= amount;
        self.withdrawn += amount;
        debug!(amount = %amount, balance = %self.balance, "출금");
        Ok(())
    }

    /// 평가손익/증거금을 직접 설정합니다. `None`인 항목은 유지됩니다.
    pub fn update_account(&mut self, profit: Option<Money>, margin: Option<Money>) -> BacktestResult<()> {
        self.ensure_initialized()?;
        if let Some(margin) = margin {
            if margin < Decimal::ZERO {
                return Err(BacktestError::InvalidAmount(format!(
                    "margin must not be negative: {}",
                    margin
                )));
            }
            self.margin = margin;
        }
        if let Some(profit) = profit {
            self.profit = profit;
        }
        Ok(())
    }

    /// 포지션 평가 결과를 반영합니다 (엔진 내부용).
    pub(crate) fn mark(&mut self, profit: Money, margin: Money) {
        self.profit = profit;
        self.margin = margin;
    }

    /// 실현손익을 잔고에 반영합니다.
    pub fn realize(&mut self, profit: Money) {
        self.balance += profit;
    }

    /// 계좌 조회 모델.
    pub fn info(&self) -> AccountInfo {
        AccountInfo::derive(
            self.login,
            self.currency.clone(),
            self.leverage,
            self.balance,
            self.profit,
            self.margin,
        )
    }

    /// 가정한 손익/증거금으로 계산한 조회 모델 (`order_check`용).
    pub fn projected(&self, balance: Money, profit: Money, margin: Money) -> AccountInfo {
        AccountInfo::derive(
            self.login,
            self.currency.clone(),
            self.leverage,
            balance,
            profit,
            margin,
        )
    }

    pub fn login(&self) -> u64 {
        self.login
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn leverage(&self) -> u32 {
        self.leverage
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn profit(&self) -> Money {
        self.profit
    }

    pub fn margin(&self) -> Money {
        self.margin
    }

    /// 순입금액 (입금 누계 - 출금 누계).
    pub fn net_deposits(&self) -> Money {
        self.deposited - self.withdrawn
    }

    /// 초기화 이전 상태로 되돌립니다.
    pub fn clear(&mut self) {
        *self = Self::new(self.login, self.currency.clone(), self.leverage);
    }

    fn ensure_initialized(&self) -> BacktestResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(BacktestError::NotInitialized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> AccountSimulator {
        let mut account = AccountSimulator::new(1001, "USD", 100);
        account.setup_account(dec!(100)).unwrap();
        account
    }

    fn assert_identity(info: &AccountInfo) {
        assert_eq!(info.equity, info.balance + info.profit);
        assert_eq!(info.margin_free, info.equity - info.margin);
    }

    #[test]
    fn test_setup_account() {
        let info = account().info();
        assert_eq!(info.balance, dec!(100));
        assert_eq!(info.equity, dec!(100));
        assert_eq!(info.margin, dec!(0));
        assert_eq!(info.login, 1001);
    }

    #[test]
    fn test_not_initialized() {
        let mut account = AccountSimulator::default();
        assert!(matches!(account.deposit(dec!(1)), Err(BacktestError::NotInitialized)));
        assert!(account.setup_account(dec!(-1)).is_err());
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let mut account = account();
        account.deposit(dec!(50)).unwrap();
        assert_eq!(account.balance(), dec!(150));

        account.withdraw(dec!(30)).unwrap();
        assert_eq!(account.balance(), dec!(120));
        assert_eq!(account.net_deposits(), dec!(120));

        assert!(account.withdraw(dec!(500)).is_err());
        assert!(account.deposit(dec!(0)).is_err());
        assert_eq!(account.balance(), dec!(120));
    }

    #[test]
    fn test_update_account_keeps_identity() {
        let mut account = account();
        account.update_account(Some(dec!(-25)), Some(dec!(40))).unwrap();
        let info = account.info();
        assert_identity(&info);
        assert_eq!(info.equity, dec!(75));
        assert_eq!(info.margin_free, dec!(35));

        account.update_account(None, Some(dec!(10))).unwrap();
        assert_eq!(account.profit(), dec!(-25));
        assert_identity(&account.info());
    }

    #[test]
    fn test_clear() {
        let mut account = account();
        account.clear();
        assert!(!account.is_initialized());
        assert_eq!(account.balance(), dec!(0));
        assert_eq!(account.leverage(), 100);
    }
}
