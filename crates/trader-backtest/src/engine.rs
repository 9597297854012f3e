//! 백테스트 엔진.
//!
//! 시계, 데이터 저장소, 계좌, 주문 시뮬레이터를 하나의 명시적 인스턴스로 묶습니다.
//! 상태 전이는 `Uninitialized → AccountReady → Running → Finished`이며,
//! 커서가 움직일 때마다 모든 포지션을 현재가로 평가합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};
use trader_core::{
    backtest_span, AccountInfo, BacktestConfig, DataKind, Deal, DealEntry, DealReason,
    HistoryOrder, Money, OrderCheckResult, OrderSendResult, OrderType, Position, Price, Rate,
    Retcode, SymbolInfo, Tick, Timeframe, TradeRequest, Volume,
};

use crate::account::AccountSimulator;
use crate::clock::{Clock, Cursor, Span};
use crate::error::{BacktestError, BacktestResult};
use crate::loader;
use crate::store::HistoricalDataStore;
use crate::trading::{self, OrderSimulator, TradePlan};

/// 엔진 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// 계좌 설정 전
    Uninitialized,
    /// 계좌 설정 완료, 커서 대기
    AccountReady,
    /// 진행 중
    Running,
    /// 구간 끝 도달 또는 종료 처리됨
    Finished,
}

/// 백테스트 엔진.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    pub(crate) clock: Clock,
    pub(crate) state: EngineState,
    pub(crate) store: HistoricalDataStore,
    pub(crate) symbols: BTreeMap<String, SymbolInfo>,
    pub(crate) account: AccountSimulator,
    pub(crate) positions: BTreeMap<u64, Position>,
    pub(crate) orders: Vec<HistoryOrder>,
    pub(crate) deals: Vec<Deal>,
    pub(crate) next_ticket: u64,
}

impl BacktestEngine {
    /// 빈 데이터 저장소로 엔진을 생성합니다.
    pub fn new(span: Span) -> Self {
        Self::with_store(span, HistoricalDataStore::new())
    }

    /// 미리 로드한 데이터로 엔진을 생성합니다.
    pub fn with_store(span: Span, store: HistoricalDataStore) -> Self {
        Self {
            clock: Clock::new(span),
            state: EngineState::Uninitialized,
            store,
            symbols: BTreeMap::new(),
            account: AccountSimulator::default(),
            positions: BTreeMap::new(),
            orders: Vec::new(),
            deals: Vec::new(),
            next_ticket: 1,
        }
    }

    /// 계좌 번호, 통화, 레버리지를 설정합니다.
    pub fn with_account(mut self, login: u64, currency: impl Into<String>, leverage: u32) -> Self {
        self.account = AccountSimulator::new(login, currency, leverage);
        self
    }

    /// 설정에서 기간, 심볼, 데이터를 읽어 엔진을 구성합니다.
    ///
    /// 계좌는 구성만 하고 초기화하지 않습니다. `setup_account`를 따로 호출해야 합니다.
    pub fn from_config(config: &BacktestConfig) -> BacktestResult<Self> {
        let span = Span::new(config.span.start, config.span.end, config.span.speed)?;
        let mut engine = Self::new(span).with_account(
            config.account.login,
            config.account.currency.clone(),
            config.account.leverage,
        );

        for symbol in &config.symbols {
            engine.add_symbol(symbol.clone());
        }

        for source in &config.data {
            match source.kind {
                DataKind::Rates => {
                    let timeframe = source.timeframe.ok_or_else(|| {
                        BacktestError::InvalidRequest(format!(
                            "rates source for {} has no timeframe",
                            source.symbol
                        ))
                    })?;
                    let rates = loader::read_rates_csv(&source.path)?;
                    let count = engine.add_rates(&source.symbol, timeframe, rates);
                    info!(symbol = %source.symbol, timeframe = %timeframe, count, path = %source.path.display(), "캔들 데이터 로드");
                }
                DataKind::Ticks => {
                    let ticks = loader::read_ticks_csv(&source.path)?;
                    let count = engine.add_ticks(&source.symbol, ticks);
                    info!(symbol = %source.symbol, count, path = %source.path.display(), "틱 데이터 로드");
                }
            }
        }

        Ok(engine)
    }

    // ==================== 구성 ====================

    /// 심볼 거래 조건을 등록합니다.
    pub fn add_symbol(&mut self, mut info: SymbolInfo) {
        info.name = info.name.to_uppercase();
        self.symbols.insert(info.name.clone(), info);
    }

    /// 캔들 데이터를 로드합니다. 등록되지 않은 심볼은 기본 조건으로 등록됩니다.
    pub fn add_rates(&mut self, symbol: &str, timeframe: Timeframe, rates: Vec<Rate>) -> usize {
        self.ensure_symbol(symbol);
        self.store.add_rates(symbol, timeframe, rates)
    }

    /// 틱 데이터를 로드합니다.
    pub fn add_ticks(&mut self, symbol: &str, ticks: Vec<Tick>) -> usize {
        self.ensure_symbol(symbol);
        self.store.add_ticks(symbol, ticks)
    }

    fn ensure_symbol(&mut self, symbol: &str) {
        let name = symbol.to_uppercase();
        if !self.symbols.contains_key(&name) {
            self.symbols.insert(name.clone(), SymbolInfo::new(name));
        }
    }

    // ==================== 조회 ====================

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn span(&self) -> &Span {
        self.clock.span()
    }

    pub fn cursor(&self) -> Cursor {
        self.clock.cursor()
    }

    /// 현재 시뮬레이션 시각.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn is_exhausted(&self) -> bool {
        self.clock.is_exhausted()
    }

    pub fn store(&self) -> &HistoricalDataStore {
        &self.store
    }

    pub fn account(&self) -> &AccountSimulator {
        &self.account
    }

    /// 계좌 정보.
    pub fn account_info(&self) -> AccountInfo {
        self.account.info()
    }

    /// 등록된 심볼 목록.
    pub fn symbols(&self) -> impl Iterator<Item = &SymbolInfo> {
        self.symbols.values()
    }

    /// 심볼 거래 조건.
    pub fn symbol_info(&self, symbol: &str) -> Option<&SymbolInfo> {
        self.symbols.get(&symbol.to_uppercase())
    }

    /// 현재 커서 시점의 최신 호가.
    pub fn symbol_info_tick(&self, symbol: &str) -> Option<Tick> {
        let info = self.symbol_info(symbol)?;
        self.store.tick_at(&info.name, self.now(), info.point)
    }

    /// 오픈 포지션 목록. `symbol`을 주면 해당 심볼만 반환합니다.
    pub fn positions_get(&self, symbol: Option<&str>) -> Vec<Position> {
        let symbol = symbol.map(str::to_uppercase);
        self.positions
            .values()
            .filter(|p| symbol.as_ref().map_or(true, |s| &p.symbol == s))
            .cloned()
            .collect()
    }

    pub fn positions_total(&self) -> usize {
        self.positions.len()
    }

    pub fn position(&self, ticket: u64) -> Option<&Position> {
        self.positions.get(&ticket)
    }

    /// `from <= time <= to` 체결 기록.
    pub fn history_deals_get(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Deal> {
        self.deals
            .iter()
            .filter(|d| d.time >= from && d.time <= to)
            .cloned()
            .collect()
    }

    /// `from <= time_done <= to` 주문 기록.
    pub fn history_orders_get(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<HistoryOrder> {
        self.orders
            .iter()
            .filter(|o| o.time_done >= from && o.time_done <= to)
            .cloned()
            .collect()
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn orders(&self) -> &[HistoryOrder] {
        &self.orders
    }

    // ==================== 과거 데이터 ====================

    /// 현재 캔들에서 `start_pos`개 이전을 끝으로 하는 `count`개 캔들.
    pub fn get_rates_from_pos(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_pos: usize,
        count: usize,
    ) -> BacktestResult<Vec<Rate>> {
        self.store
            .get_rates_from_pos(symbol, timeframe, self.now(), start_pos, count)
    }

    /// `date_from` 이하의 마지막 `count`개 캔들.
    pub fn get_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> BacktestResult<Vec<Rate>> {
        self.store
            .get_rates_from(symbol, timeframe, self.now(), date_from, count)
    }

    /// 기간 내 캔들.
    pub fn get_rates_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Rate>> {
        self.store
            .get_rates_range(symbol, timeframe, self.now(), date_from, date_to)
    }

    /// `date_from`부터 최대 `count`개 틱.
    pub fn get_ticks_from(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> BacktestResult<Vec<Tick>> {
        self.store.get_ticks_from(symbol, self.now(), date_from, count)
    }

    /// 기간 내 틱.
    pub fn get_ticks_range(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Tick>> {
        self.store
            .get_ticks_range(symbol, self.now(), date_from, date_to)
    }

    // ==================== 계좌 ====================

    /// 계좌를 초기화합니다. 포지션과 거래 기록도 비워집니다.
    pub fn setup_account(&mut self, balance: Money) -> BacktestResult<()> {
        if self.state == EngineState::Finished {
            return Err(BacktestError::SessionFinished(self.now()));
        }
        self.account.setup_account(balance)?;
        self.positions.clear();
        self.orders.clear();
        self.deals.clear();
        self.state = EngineState::AccountReady;
        Ok(())
    }

    pub fn deposit(&mut self, amount: Money) -> BacktestResult<()> {
        self.ensure_active()?;
        self.account.deposit(amount)
    }

    pub fn withdraw(&mut self, amount: Money) -> BacktestResult<()> {
        self.ensure_active()?;
        self.account.withdraw(amount)
    }

    /// 평가손익/증거금을 직접 설정합니다. 다음 커서 이동 시 포지션 평가로 덮어씁니다.
    pub fn update_account(&mut self, profit: Option<Money>, margin: Option<Money>) -> BacktestResult<()> {
        self.ensure_active()?;
        self.account.update_account(profit, margin)
    }

    // ==================== 커서 ====================

    /// 한 단계 전진합니다. 구간 끝에 도달하면 `None`을 반환하고 세션을 종료합니다.
    pub fn next(&mut self) -> BacktestResult<Option<Cursor>> {
        self.ensure_active()?;
        self.state = EngineState::Running;
        self.step()
    }

    /// `steps` 단계 전진합니다. 각 단계마다 손절/익절을 확인합니다.
    pub fn fast_forward(&mut self, steps: u64) -> BacktestResult<Cursor> {
        self.ensure_active()?;
        self.state = EngineState::Running;
        for _ in 0..steps {
            if self.step()?.is_none() {
                break;
            }
        }
        Ok(self.cursor())
    }

    /// 지정 시각으로 이동합니다.
    ///
    /// 앞으로 이동하면 `fast_forward`와 같이 한 단계씩 진행하며 손절/익절을 확인합니다.
    /// 뒤로 이동하면 지나간 경로가 없으므로 현재가 평가만 합니다.
    pub fn go_to(&mut self, time: DateTime<Utc>) -> BacktestResult<Cursor> {
        self.ensure_active()?;
        self.state = EngineState::Running;

        let target = self.clock.span().align(time);
        let current = self.clock.cursor().index;
        let cursor = if target > current {
            let steps = (target - current) / i64::from(self.clock.span().speed);
            self.fast_forward(steps as u64)?
        } else {
            let cursor = self.clock.go_to(time);
            self.mark_to_market();
            cursor
        };
        debug!(index = cursor.index, time = %cursor.time, "커서 이동");
        Ok(cursor)
    }

    /// 세션을 처음 상태로 되돌립니다. 로드된 데이터와 심볼은 유지됩니다.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.account.clear();
        self.positions.clear();
        self.orders.clear();
        self.deals.clear();
        self.next_ticket = 1;
        self.state = EngineState::Uninitialized;
        info!("백테스트 세션 초기화");
    }

    fn step(&mut self) -> BacktestResult<Option<Cursor>> {
        match self.clock.next() {
            Some(cursor) => {
                self.mark_to_market();
                self.check_stops();
                Ok(Some(cursor))
            }
            None => {
                self.state = EngineState::Finished;
                info!(time = %self.now(), "시뮬레이션 구간 종료");
                Ok(None)
            }
        }
    }

    // ==================== 주문 ====================

    /// 증거금 계산 (상태 변경 없음).
    pub fn order_calc_margin(
        &self,
        _order_type: OrderType,
        symbol: &str,
        volume: Volume,
        price: Price,
    ) -> BacktestResult<Money> {
        let info = self.require_symbol(symbol)?;
        Ok(trading::calc_margin(info, self.account.leverage(), volume, price))
    }

    /// 가정 손익 계산 (상태 변경 없음).
    pub fn order_calc_profit(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: Volume,
        price_open: Price,
        price_close: Price,
    ) -> BacktestResult<Money> {
        let info = self.require_symbol(symbol)?;
        Ok(trading::calc_profit(info, order_type, volume, price_open, price_close))
    }

    /// 주문을 검사만 합니다.
    pub fn order_check(&self, request: &TradeRequest) -> BacktestResult<OrderCheckResult> {
        if !self.account.is_initialized() {
            return Err(BacktestError::NotInitialized);
        }
        let tick = self.symbol_info_tick(&request.symbol);
        let eval = self.simulator().evaluate(request, tick.as_ref())?;

        Ok(OrderCheckResult {
            retcode: eval.retcode,
            balance: eval.projected.balance,
            equity: eval.projected.equity,
            profit: eval.projected.profit,
            margin: eval.projected.margin,
            margin_free: eval.projected.margin_free,
            margin_level: eval.projected.margin_level,
            comment: eval.comment,
            request: request.clone(),
        })
    }

    /// 주문을 검사하고 통과하면 적용합니다. 실패 시 계좌와 포지션은 변하지 않습니다.
    pub fn order_send(&mut self, request: TradeRequest) -> BacktestResult<OrderSendResult> {
        self.ensure_active()?;
        self.state = EngineState::Running;

        let _span = backtest_span!("order_send", request.symbol).entered();
        let tick = self.symbol_info_tick(&request.symbol);
        let eval = match self.simulator().evaluate(&request, tick.as_ref()) {
            Ok(eval) => eval,
            Err(e) => {
                if e.is_validation() {
                    warn!(error = %e, "잘못된 주문 요청");
                }
                return Err(e);
            }
        };

        let Some(plan) = eval.plan else {
            warn!(retcode = eval.retcode.code(), comment = %eval.comment, "주문 거부");
            return Ok(OrderSendResult::rejected(
                eval.retcode,
                eval.comment,
                request,
                eval.bid,
                eval.ask,
            ));
        };

        let (order, deal, volume, price) = match plan {
            TradePlan::Open {
                symbol,
                order_type,
                volume,
                price,
                sl,
                tp,
            } => {
                let (order, deal) = self.open_position(&symbol, order_type, volume, price, sl, tp, &request);
                (order, deal, volume, price)
            }
            TradePlan::Close {
                ticket,
                volume,
                price,
                profit,
            } => {
                let (order, deal) = self.close_volume(
                    ticket,
                    volume,
                    price,
                    profit,
                    DealReason::Client,
                    request.magic,
                    &request.comment,
                );
                (order, deal, volume, price)
            }
            TradePlan::ModifyStops { ticket, sl, tp } => {
                if let Some(position) = self.positions.get_mut(&ticket) {
                    position.sl = sl;
                    position.tp = tp;
                }
                info!(ticket, sl = %sl, tp = %tp, "손절/익절 수정");
                (0, 0, Decimal::ZERO, Decimal::ZERO)
            }
        };

        self.mark_to_market();

        Ok(OrderSendResult {
            retcode: Retcode::Done,
            deal,
            order,
            volume,
            price,
            bid: eval.bid,
            ask: eval.ask,
            comment: eval.comment,
            request,
        })
    }

    /// 포지션 전체를 시장가로 청산합니다.
    pub fn close_position(&mut self, ticket: u64) -> BacktestResult<OrderSendResult> {
        let Some(position) = self.positions.get(&ticket) else {
            self.ensure_active()?;
            let request = TradeRequest::deal(String::new(), OrderType::Buy, Decimal::ZERO).closing(ticket);
            return Ok(OrderSendResult::rejected(
                Retcode::PositionClosed,
                format!("{}: position #{}", Retcode::PositionClosed.description(), ticket),
                request,
                Decimal::ZERO,
                Decimal::ZERO,
            ));
        };

        let request = TradeRequest::deal(position.symbol.clone(), position.closing_type(), position.volume)
            .closing(ticket)
            .with_magic(position.magic);
        self.order_send(request)
    }

    fn simulator(&self) -> OrderSimulator<'_> {
        OrderSimulator::new(&self.symbols, &self.account, &self.positions)
    }

    fn issue_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    #[allow(clippy::too_many_arguments)]
    fn open_position(
        &mut self,
        symbol: &str,
        order_type: OrderType,
        volume: Volume,
        price: Price,
        sl: Price,
        tp: Price,
        request: &TradeRequest,
    ) -> (u64, u64) {
        let now = self.now();
        let order = self.issue_ticket();
        let deal = self.issue_ticket();

        self.positions.insert(
            order,
            Position {
                ticket: order,
                symbol: symbol.to_string(),
                position_type: order_type,
                volume,
                price_open: price,
                price_current: price,
                sl,
                tp,
                profit: Decimal::ZERO,
                magic: request.magic,
                comment: request.comment.clone(),
                time: now,
            },
        );
        self.orders.push(HistoryOrder {
            ticket: order,
            position_id: order,
            symbol: symbol.to_string(),
            order_type,
            volume,
            price,
            time_done: now,
            magic: request.magic,
            comment: request.comment.clone(),
        });
        self.deals.push(Deal {
            ticket: deal,
            order,
            position_id: order,
            symbol: symbol.to_string(),
            deal_type: order_type,
            entry: DealEntry::In,
            reason: DealReason::Client,
            volume,
            price,
            profit: Decimal::ZERO,
            time: now,
            magic: request.magic,
            comment: request.comment.clone(),
        });

        info!(ticket = order, side = %order_type, volume = %volume, price = %price, "포지션 진입");
        (order, deal)
    }

    /// 포지션 수량 일부 또는 전부를 청산하고 실현손익을 잔고에 반영합니다.
    #[allow(clippy::too_many_arguments)]
    fn close_volume(
        &mut self,
        ticket: u64,
        volume: Volume,
        price: Price,
        profit: Money,
        reason: DealReason,
        magic: u64,
        comment: &str,
    ) -> (u64, u64) {
        let Some(position) = self.positions.get(&ticket).cloned() else {
            return (0, 0);
        };

        let now = self.now();
        let order = self.issue_ticket();
        let deal = self.issue_ticket();
        let deal_type = position.closing_type();

        if volume >= position.volume {
            self.positions.remove(&ticket);
        } else if let Some(open) = self.positions.get_mut(&ticket) {
            open.volume -= volume;
        }
        self.account.realize(profit);

        self.orders.push(HistoryOrder {
            ticket: order,
            position_id: ticket,
            symbol: position.symbol.clone(),
            order_type: deal_type,
            volume,
            price,
            time_done: now,
            magic,
            comment: comment.to_string(),
        });
        self.deals.push(Deal {
            ticket: deal,
            order,
            position_id: ticket,
            symbol: position.symbol.clone(),
            deal_type,
            entry: DealEntry::Out,
            reason,
            volume,
            price,
            profit,
            time: now,
            magic,
            comment: comment.to_string(),
        });

        info!(
            ticket,
            reason = ?reason,
            volume = %volume,
            price = %price,
            profit = %profit,
            "포지션 청산"
        );
        (order, deal)
    }

    // ==================== 평가 ====================

    /// 모든 포지션을 현재가로 평가하고 계좌 손익/증거금을 다시 계산합니다.
    fn mark_to_market(&mut self) {
        let now = self.now();
        let leverage = self.account.leverage();
        let mut total_profit = Decimal::ZERO;
        let mut total_margin = Decimal::ZERO;

        for position in self.positions.values_mut() {
            let Some(info) = self.symbols.get(&position.symbol) else {
                continue;
            };
            if let Some(tick) = self.store.tick_at(&position.symbol, now, info.point) {
                position.price_current = trading::close_price(position.position_type, &tick);
                position.profit = trading::calc_profit(
                    info,
                    position.position_type,
                    position.volume,
                    position.price_open,
                    position.price_current,
                );
            }
            total_profit += position.profit;
            total_margin += trading::calc_margin(info, leverage, position.volume, position.price_open);
        }

        if self.account.is_initialized() {
            self.account.mark(total_profit, total_margin);
        }
    }

    /// 현재가가 손절/익절에 닿은 포지션을 청산합니다.
    fn check_stops(&mut self) {
        let triggered: Vec<(u64, DealReason)> = self
            .positions
            .values()
            .filter_map(|p| {
                if p.sl_hit(p.price_current) {
                    Some((p.ticket, DealReason::Sl))
                } else if p.tp_hit(p.price_current) {
                    Some((p.ticket, DealReason::Tp))
                } else {
                    None
                }
            })
            .collect();

        if triggered.is_empty() {
            return;
        }

        for (ticket, reason) in triggered {
            let Some(position) = self.positions.get(&ticket).cloned() else {
                continue;
            };
            let comment = match reason {
                DealReason::Sl => format!("sl {}", position.sl),
                _ => format!("tp {}", position.tp),
            };
            self.close_volume(
                ticket,
                position.volume,
                position.price_current,
                position.profit,
                reason,
                position.magic,
                &comment,
            );
        }
        self.mark_to_market();
    }

    // ==================== 종료 ====================

    /// 현재 상태를 스냅샷으로 저장하고 세션을 종료합니다.
    pub fn wrap_up<P: AsRef<Path>>(&mut self, path: P) -> BacktestResult<()> {
        crate::snapshot::save(self, path.as_ref())?;
        self.state = EngineState::Finished;
        info!(path = %path.as_ref().display(), time = %self.now(), "백테스트 종료 및 스냅샷 저장");
        Ok(())
    }

    fn ensure_active(&self) -> BacktestResult<()> {
        match self.state {
            EngineState::Uninitialized => Err(BacktestError::NotInitialized),
            EngineState::Finished => Err(BacktestError::SessionFinished(self.now())),
            EngineState::AccountReady | EngineState::Running => Ok(()),
        }
    }

    fn require_symbol(&self, symbol: &str) -> BacktestResult<&SymbolInfo> {
        self.symbol_info(symbol)
            .ok_or_else(|| BacktestError::UnknownSymbol(symbol.to_string()))
    }
}
