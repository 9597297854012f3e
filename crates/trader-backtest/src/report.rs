//! 백테스트 결과 요약.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use trader_core::{DecimalExt, Money};

use crate::engine::{BacktestEngine, EngineState};

/// 세션 결과 요약.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// 마지막 커서 시각
    pub cursor_time: DateTime<Utc>,
    pub state: EngineState,
    /// 순입금액 (초기 잔고 + 입금 - 출금)
    pub net_deposits: Money,
    pub final_balance: Money,
    pub final_equity: Money,
    /// 실현손익 합계
    pub realized_profit: Money,
    /// 평가손익
    pub floating_profit: Money,
    /// 순손익 (equity - 순입금액)
    pub net_profit: Money,
    pub total_deals: usize,
    /// 청산 체결 수
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// 승률 (%)
    pub win_rate: Decimal,
    pub largest_win: Money,
    pub largest_loss: Money,
    pub open_positions: usize,
}

impl BacktestReport {
    /// 엔진 현재 상태에서 요약을 만듭니다.
    pub fn from_engine(engine: &BacktestEngine) -> Self {
        let info = engine.account_info();
        let exits: Vec<Money> = engine
            .deals()
            .iter()
            .filter(|d| d.is_exit())
            .map(|d| d.profit)
            .collect();

        let winning_trades = exits.iter().filter(|p| **p > Decimal::ZERO).count();
        let losing_trades = exits.iter().filter(|p| **p < Decimal::ZERO).count();
        let win_rate = if exits.is_empty() {
            Decimal::ZERO
        } else {
            (Decimal::from(winning_trades) * Decimal::ONE_HUNDRED / Decimal::from(exits.len()))
                .round_money(2)
        };
        let net_deposits = engine.account().net_deposits();

        Self {
            start: engine.span().start,
            end: engine.span().end,
            cursor_time: engine.now(),
            state: engine.state(),
            net_deposits,
            final_balance: info.balance,
            final_equity: info.equity,
            realized_profit: exits.iter().copied().sum(),
            floating_profit: info.profit,
            net_profit: info.equity - net_deposits,
            total_deals: engine.deals().len(),
            closed_trades: exits.len(),
            winning_trades,
            losing_trades,
            win_rate,
            largest_win: exits.iter().copied().filter(|p| *p > Decimal::ZERO).max().unwrap_or_default(),
            largest_loss: exits.iter().copied().filter(|p| *p < Decimal::ZERO).min().unwrap_or_default(),
            open_positions: engine.positions_total(),
        }
    }
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "기간:        {} ~ {}", self.start, self.end)?;
        writeln!(f, "커서:        {} ({:?})", self.cursor_time, self.state)?;
        writeln!(f, "순입금액:    {}", self.net_deposits)?;
        writeln!(f, "최종 잔고:   {}", self.final_balance)?;
        writeln!(f, "최종 평가:   {}", self.final_equity)?;
        writeln!(f, "순손익:      {} (실현 {}, 평가 {})", self.net_profit, self.realized_profit, self.floating_profit)?;
        writeln!(
            f,
            "청산 거래:   {} (승 {} / 패 {}, 승률 {}%)",
            self.closed_trades, self.winning_trades, self.losing_trades, self.win_rate
        )?;
        writeln!(f, "최대 이익:   {}", self.largest_win)?;
        writeln!(f, "최대 손실:   {}", self.largest_loss)?;
        write!(f, "오픈 포지션: {}", self.open_positions)
    }
}
