//! 터미널 인터페이스.
//!
//! 전략 코드는 [`Terminal`] trait만 바라보므로 실거래 터미널과 백테스트 엔진을
//! 바꿔 끼울 수 있습니다. 여러 전략이 한 엔진을 공유할 때는 [`SharedEngine`]이
//! 쓰기 작업을 하나의 흐름으로 직렬화합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use trader_core::{
    AccountInfo, Deal, Money, OrderCheckResult, OrderSendResult, OrderType, Position, Price,
    Rate, SymbolInfo, Tick, Timeframe, TradeRequest, Volume,
};

use crate::clock::Cursor;
use crate::engine::BacktestEngine;
use crate::error::{BacktestError, BacktestResult};

/// 통합 터미널 인터페이스.
#[async_trait]
pub trait Terminal: Send + Sync {
    // === 계좌 ===

    async fn account_info(&self) -> BacktestResult<AccountInfo>;

    // === 시장 데이터 ===

    async fn symbol_info(&self, symbol: &str) -> BacktestResult<SymbolInfo>;

    async fn symbol_info_tick(&self, symbol: &str) -> BacktestResult<Tick>;

    async fn copy_rates_from_pos(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_pos: usize,
        count: usize,
    ) -> BacktestResult<Vec<Rate>>;

    async fn copy_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> BacktestResult<Vec<Rate>>;

    async fn copy_rates_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Rate>>;

    async fn copy_ticks_from(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> BacktestResult<Vec<Tick>>;

    async fn copy_ticks_range(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Tick>>;

    // === 주문 ===

    async fn order_check(&self, request: &TradeRequest) -> BacktestResult<OrderCheckResult>;

    async fn order_send(&self, request: TradeRequest) -> BacktestResult<OrderSendResult>;

    async fn order_calc_margin(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: Volume,
        price: Price,
    ) -> BacktestResult<Money>;

    async fn order_calc_profit(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: Volume,
        price_open: Price,
        price_close: Price,
    ) -> BacktestResult<Money>;

    // === 포지션 및 기록 ===

    async fn positions_get(&self, symbol: Option<&str>) -> BacktestResult<Vec<Position>>;

    /// 오픈 포지션 수 (기본 구현은 `positions_get` 사용).
    async fn positions_total(&self) -> BacktestResult<usize> {
        Ok(self.positions_get(None).await?.len())
    }

    async fn history_deals_get(
        &self,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Deal>>;
}

/// 여러 작업자가 공유하는 엔진 핸들.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<BacktestEngine>>,
}

impl SharedEngine {
    pub fn new(engine: BacktestEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// 한 단계 전진합니다.
    pub async fn next(&self) -> BacktestResult<Option<Cursor>> {
        self.inner.write().await.next()
    }

    /// 여러 단계 전진합니다.
    pub async fn fast_forward(&self, steps: u64) -> BacktestResult<Cursor> {
        self.inner.write().await.fast_forward(steps)
    }

    pub async fn cursor(&self) -> Cursor {
        self.inner.read().await.cursor()
    }

    /// 엔진에 읽기 작업을 실행합니다.
    pub async fn read<T>(&self, f: impl FnOnce(&BacktestEngine) -> T) -> T {
        f(&*self.inner.read().await)
    }

    /// 엔진에 쓰기 작업을 실행합니다.
    pub async fn write<T>(&self, f: impl FnOnce(&mut BacktestEngine) -> T) -> T {
        f(&mut *self.inner.write().await)
    }

    /// 다른 핸들이 없으면 엔진을 꺼냅니다.
    pub fn try_into_inner(self) -> Result<BacktestEngine, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}

#[async_trait]
impl Terminal for SharedEngine {
    async fn account_info(&self) -> BacktestResult<AccountInfo> {
        Ok(self.inner.read().await.account_info())
    }

    async fn symbol_info(&self, symbol: &str) -> BacktestResult<SymbolInfo> {
        self.inner
            .read()
            .await
            .symbol_info(symbol)
            .cloned()
            .ok_or_else(|| BacktestError::UnknownSymbol(symbol.to_string()))
    }

    async fn symbol_info_tick(&self, symbol: &str) -> BacktestResult<Tick> {
        self.inner
            .read()
            .await
            .symbol_info_tick(symbol)
            .ok_or_else(|| BacktestError::NoData(format!("{} tick", symbol)))
    }

    async fn copy_rates_from_pos(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_pos: usize,
        count: usize,
    ) -> BacktestResult<Vec<Rate>> {
        self.inner
            .read()
            .await
            .get_rates_from_pos(symbol, timeframe, start_pos, count)
    }

    async fn copy_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> BacktestResult<Vec<Rate>> {
        self.inner
            .read()
            .await
            .get_rates_from(symbol, timeframe, date_from, count)
    }

    async fn copy_rates_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Rate>> {
        self.inner
            .read()
            .await
            .get_rates_range(symbol, timeframe, date_from, date_to)
    }

    async fn copy_ticks_from(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> BacktestResult<Vec<Tick>> {
        self.inner
            .read()
            .await
            .get_ticks_from(symbol, date_from, count)
    }

    async fn copy_ticks_range(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Tick>> {
        self.inner
            .read()
            .await
            .get_ticks_range(symbol, date_from, date_to)
    }

    async fn order_check(&self, request: &TradeRequest) -> BacktestResult<OrderCheckResult> {
        self.inner.read().await.order_check(request)
    }

    async fn order_send(&self, request: TradeRequest) -> BacktestResult<OrderSendResult> {
        self.inner.write().await.order_send(request)
    }

    async fn order_calc_margin(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: Volume,
        price: Price,
    ) -> BacktestResult<Money> {
        self.inner
            .read()
            .await
            .order_calc_margin(order_type, symbol, volume, price)
    }

    async fn order_calc_profit(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: Volume,
        price_open: Price,
        price_close: Price,
    ) -> BacktestResult<Money> {
        self.inner
            .read()
            .await
            .order_calc_profit(order_type, symbol, volume, price_open, price_close)
    }

    async fn positions_get(&self, symbol: Option<&str>) -> BacktestResult<Vec<Position>> {
        Ok(self.inner.read().await.positions_get(symbol))
    }

    async fn history_deals_get(
        &self,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Deal>> {
        Ok(self.inner.read().await.history_deals_get(date_from, date_to))
    }
}
