//! 주문 시뮬레이터.
//!
//! 현재 틱을 기준으로 브로커의 주문 처리 규칙을 흉내냅니다. 이 모듈은 상태를
//! 바꾸지 않습니다. 요청을 검사해 [`Evaluation`]을 만들고, 실제 반영은 엔진이
//! 검사를 통과한 [`TradePlan`]으로만 수행합니다.
//!
//! 잘못된 형식의 요청은 `Err`로, 브로커형 실패는 `Retcode`로 보고됩니다.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use trader_core::{
    AccountInfo, DecimalExt, Money, OrderType, Position, Price, Retcode, SymbolInfo, Tick,
    TradeAction, TradeMode, TradeRequest, Volume,
};

use crate::account::AccountSimulator;
use crate::error::{BacktestError, BacktestResult};

/// 증거금 계산.
///
/// 명목가(`volume * contract_size * price`)에 계산 방식별로 레버리지를 적용하고
/// `margin_rate`를 곱합니다. 통화 변환은 하지 않습니다.
pub fn calc_margin(info: &SymbolInfo, leverage: u32, volume: Volume, price: Price) -> Money {
    let notional = volume * info.contract_size * price;
    let margin = if info.calc_mode.uses_leverage() {
        notional / Decimal::from(leverage.max(1))
    } else {
        notional
    };
    margin * info.margin_rate
}

/// 진입가와 청산가 사이 손익.
pub fn calc_profit(
    info: &SymbolInfo,
    order_type: OrderType,
    volume: Volume,
    price_open: Price,
    price_close: Price,
) -> Money {
    let diff = match order_type {
        OrderType::Buy => price_close - price_open,
        OrderType::Sell => price_open - price_close,
    };
    diff * info.contract_size * volume
}

/// 신규 진입 체결 가격 (매수는 ask, 매도는 bid).
pub fn fill_price(order_type: OrderType, tick: &Tick) -> Price {
    match order_type {
        OrderType::Buy => tick.ask,
        OrderType::Sell => tick.bid,
    }
}

/// 포지션 청산 기준 가격 (매수 포지션은 bid, 매도 포지션은 ask).
pub fn close_price(position_type: OrderType, tick: &Tick) -> Price {
    fill_price(position_type.opposite(), tick)
}

/// 검사를 통과한 요청이 계좌에 적용할 변경.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradePlan {
    /// 신규 포지션 진입
    Open {
        symbol: String,
        order_type: OrderType,
        volume: Volume,
        price: Price,
        sl: Price,
        tp: Price,
    },
    /// 포지션 전체 또는 일부 청산
    Close {
        ticket: u64,
        volume: Volume,
        price: Price,
        profit: Money,
    },
    /// 손절/익절 수정
    ModifyStops { ticket: u64, sl: Price, tp: Price },
}

/// 주문 검사 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub retcode: Retcode,
    pub comment: String,
    /// `Done`일 때만 존재
    pub plan: Option<TradePlan>,
    /// 체결을 가정한 계좌 예상값
    pub projected: AccountInfo,
    pub bid: Price,
    pub ask: Price,
}

impl Evaluation {
    pub fn is_done(&self) -> bool {
        self.retcode.is_done()
    }
}

/// 주문 검사기. 엔진 상태를 빌려 요청 하나를 평가합니다.
pub struct OrderSimulator<'a> {
    symbols: &'a BTreeMap<String, SymbolInfo>,
    account: &'a AccountSimulator,
    positions: &'a BTreeMap<u64, Position>,
}

impl<'a> OrderSimulator<'a> {
    pub fn new(
        symbols: &'a BTreeMap<String, SymbolInfo>,
        account: &'a AccountSimulator,
        positions: &'a BTreeMap<u64, Position>,
    ) -> Self {
        Self {
            symbols,
            account,
            positions,
        }
    }

    /// 요청을 평가합니다. `tick`은 요청 심볼의 현재 호가입니다.
    ///
    /// 검사 순서: 심볼, 거래 허용 범위, 가격 편차, 수량, 손절/익절, 대상 포지션, 증거금.
    pub fn evaluate(&self, request: &TradeRequest, tick: Option<&Tick>) -> BacktestResult<Evaluation> {
        validate_shape(request)?;

        let (bid, ask) = tick.map(|t| (t.bid, t.ask)).unwrap_or_default();
        let current = self.account.info();
        let reject = |retcode: Retcode, detail: String| Evaluation {
            retcode,
            comment: format!("{}: {}", retcode.description(), detail),
            plan: None,
            projected: current.clone(),
            bid,
            ask,
        };

        let symbol = request.symbol.to_uppercase();
        let Some(info) = self.symbols.get(&symbol) else {
            return Ok(reject(Retcode::Invalid, format!("unknown symbol {}", symbol)));
        };
        let Some(tick) = tick else {
            return Ok(reject(
                Retcode::MarketClosed,
                format!("no price for {} at the current cursor", symbol),
            ));
        };

        let outcome = match (request.action, request.position) {
            (TradeAction::Sltp, Some(ticket)) => self.check_modify(info, request, tick, ticket),
            (TradeAction::Deal, Some(ticket)) => self.check_close(info, request, tick, ticket),
            (TradeAction::Deal, None) => self.check_open(info, request, tick),
            (TradeAction::Sltp, None) => {
                return Err(BacktestError::InvalidRequest(
                    "stop modification requires a position ticket".into(),
                ))
            }
        };

        Ok(match outcome {
            Ok((plan, projected)) => Evaluation {
                retcode: Retcode::Done,
                comment: Retcode::Done.description().to_string(),
                plan: Some(plan),
                projected,
                bid,
                ask,
            },
            Err((retcode, detail)) => reject(retcode, detail),
        })
    }

    fn check_open(&self, info: &SymbolInfo, request: &TradeRequest, tick: &Tick) -> Check {
        match (info.trade_mode, request.order_type) {
            (TradeMode::Disabled, _) => return reject(Retcode::TradeDisabled, &info.name),
            (TradeMode::CloseOnly, _) => return reject(Retcode::CloseOnly, &info.name),
            (TradeMode::LongOnly, OrderType::Sell) => return reject(Retcode::LongOnly, &info.name),
            (TradeMode::ShortOnly, OrderType::Buy) => return reject(Retcode::ShortOnly, &info.name),
            _ => {}
        }

        let price = fill_price(request.order_type, tick);
        check_deviation(info, request, price)?;
        check_volume(info, request.volume)?;
        check_stops(info, request.order_type, close_price(request.order_type, tick), request.sl, request.tp)?;

        let leverage = self.account.leverage();
        let margin = self.account.margin() + calc_margin(info, leverage, request.volume, price);
        let profit = self.account.profit()
            + calc_profit(
                info,
                request.order_type,
                request.volume,
                price,
                close_price(request.order_type, tick),
            );
        let projected = self.account.projected(self.account.balance(), profit, margin);

        if projected.margin_free < Decimal::ZERO {
            return Err((
                Retcode::NoMoney,
                format!(
                    "required margin {} exceeds free margin {}",
                    margin - self.account.margin(),
                    self.account.info().margin_free
                ),
            ));
        }

        Ok((
            TradePlan::Open {
                symbol: info.name.clone(),
                order_type: request.order_type,
                volume: request.volume,
                price,
                sl: request.sl,
                tp: request.tp,
            },
            projected,
        ))
    }

    fn check_close(&self, info: &SymbolInfo, request: &TradeRequest, tick: &Tick, ticket: u64) -> Check {
        if info.trade_mode == TradeMode::Disabled {
            return reject(Retcode::TradeDisabled, &info.name);
        }
        let position = self.position(info, ticket)?;
        if request.order_type != position.closing_type() {
            return Err((
                Retcode::Invalid,
                format!(
                    "closing position #{} ({}) requires a {} order",
                    ticket,
                    position.position_type,
                    position.closing_type()
                ),
            ));
        }

        let price = close_price(position.position_type, tick);
        check_deviation(info, request, price)?;
        if request.volume > position.volume {
            return Err((
                Retcode::InvalidVolume,
                format!("volume {} exceeds open volume {}", request.volume, position.volume),
            ));
        }
        if !request.volume.is_multiple_of(info.volume_step) {
            return Err((
                Retcode::InvalidVolume,
                format!("volume {} is not a multiple of step {}", request.volume, info.volume_step),
            ));
        }

        let profit = calc_profit(info, position.position_type, request.volume, position.price_open, price);
        let share = request.volume / position.volume;
        let leverage = self.account.leverage();
        let released = calc_margin(info, leverage, request.volume, position.price_open);
        let projected = self.account.projected(
            self.account.balance() + profit,
            self.account.profit() - position.profit * share,
            (self.account.margin() - released).max(Decimal::ZERO),
        );

        Ok((
            TradePlan::Close {
                ticket,
                volume: request.volume,
                price,
                profit,
            },
            projected,
        ))
    }

    fn check_modify(&self, info: &SymbolInfo, request: &TradeRequest, tick: &Tick, ticket: u64) -> Check {
        if info.trade_mode == TradeMode::Disabled {
            return reject(Retcode::TradeDisabled, &info.name);
        }
        let position = self.position(info, ticket)?;
        check_stops(
            info,
            position.position_type,
            close_price(position.position_type, tick),
            request.sl,
            request.tp,
        )?;

        Ok((
            TradePlan::ModifyStops {
                ticket,
                sl: request.sl,
                tp: request.tp,
            },
            self.account.info(),
        ))
    }

    fn position(&self, info: &SymbolInfo, ticket: u64) -> Result<&'a Position, (Retcode, String)> {
        let position = self
            .positions
            .get(&ticket)
            .ok_or_else(|| (Retcode::PositionClosed, format!("position #{}", ticket)))?;
        if position.symbol != info.name {
            return Err((
                Retcode::Invalid,
                format!("position #{} belongs to {}", ticket, position.symbol),
            ));
        }
        Ok(position)
    }
}

type Check = Result<(TradePlan, AccountInfo), (Retcode, String)>;

fn reject(retcode: Retcode, symbol: &str) -> Check {
    Err((retcode, symbol.to_string()))
}

fn validate_shape(request: &TradeRequest) -> BacktestResult<()> {
    if request.symbol.trim().is_empty() {
        return Err(BacktestError::InvalidRequest("symbol is empty".into()));
    }
    if request.action == TradeAction::Deal && request.volume <= Decimal::ZERO {
        return Err(BacktestError::InvalidRequest(format!(
            "volume must be positive: {}",
            request.volume
        )));
    }
    for (name, value) in [("price", request.price), ("sl", request.sl), ("tp", request.tp)] {
        if value < Decimal::ZERO {
            return Err(BacktestError::InvalidRequest(format!(
                "{} must not be negative: {}",
                name, value
            )));
        }
    }
    Ok(())
}

fn check_deviation(info: &SymbolInfo, request: &TradeRequest, market: Price) -> Result<(), (Retcode, String)> {
    if request.price.is_zero() {
        return Ok(());
    }
    let allowed = info.points(request.deviation);
    if (request.price - market).abs() > allowed {
        return Err((
            Retcode::Requote,
            format!(
                "requested {} vs market {} (deviation {} points)",
                request.price, market, request.deviation
            ),
        ));
    }
    Ok(())
}

fn check_volume(info: &SymbolInfo, volume: Volume) -> Result<(), (Retcode, String)> {
    if volume < info.volume_min || volume > info.volume_max {
        return Err((
            Retcode::InvalidVolume,
            format!(
                "volume {} outside [{}, {}]",
                volume, info.volume_min, info.volume_max
            ),
        ));
    }
    if !volume.is_multiple_of(info.volume_step) {
        return Err((
            Retcode::InvalidVolume,
            format!("volume {} is not a multiple of step {}", volume, info.volume_step),
        ));
    }
    Ok(())
}

/// 손절/익절이 청산 기준 가격의 올바른 쪽에 `stops_level` 이상 떨어져 있는지 확인합니다.
fn check_stops(
    info: &SymbolInfo,
    position_type: OrderType,
    close: Price,
    sl: Price,
    tp: Price,
) -> Result<(), (Retcode, String)> {
    let distance = info.points(info.stops_level);
    let (sl_ok, tp_ok) = match position_type {
        OrderType::Buy => (
            sl.is_zero() || (sl < close && close - sl >= distance),
            tp.is_zero() || (tp > close && tp - close >= distance),
        ),
        OrderType::Sell => (
            sl.is_zero() || (sl > close && sl - close >= distance),
            tp.is_zero() || (tp < close && close - tp >= distance),
        ),
    };

    if sl_ok && tp_ok {
        Ok(())
    } else {
        Err((
            Retcode::InvalidStops,
            format!(
                "sl {} / tp {} invalid for {} at {} (stops level {})",
                sl, tp, position_type, close, info.stops_level
            ),
        ))
    }
}
