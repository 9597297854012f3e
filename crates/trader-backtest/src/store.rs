//! 과거 데이터 저장소.
//!
//! 엔진 생성 시 한 번 로드된 캔들/틱 시리즈를 보관하고, 현재 커서 시각(`now`)을
//! 기준으로 조회합니다. 모든 조회는 `now` 이후 데이터를 돌려주지 않습니다.
//!
//! `now`에 아직 진행 중인 캔들은 시가와 그때까지 보이는 더 짧은 데이터(틱 또는
//! 하위 타임프레임 캔들)로만 채운 부분 캔들로 돌려줍니다.

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use trader_core::{Price, Rate, Tick, Timeframe};

use crate::error::{BacktestError, BacktestResult};

/// (심볼, 타임프레임) 캔들 시리즈.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RateSeries {
    symbol: String,
    timeframe: Timeframe,
    rates: Vec<Rate>,
}

/// 심볼 틱 시리즈.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TickSeries {
    symbol: String,
    ticks: Vec<Tick>,
}

/// 과거 데이터 저장소.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalDataStore {
    rates: Vec<RateSeries>,
    ticks: Vec<TickSeries>,
}

impl HistoricalDataStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 캔들 데이터를 로드합니다. 같은 시각의 캔들은 나중 값이 남습니다.
    /// 로드 후 시리즈 길이를 반환합니다.
    pub fn add_rates(&mut self, symbol: &str, timeframe: Timeframe, rates: Vec<Rate>) -> usize {
        let symbol = symbol.to_uppercase();
        let mut merged: BTreeMap<DateTime<Utc>, Rate> = BTreeMap::new();

        if let Some(pos) = self
            .rates
            .iter()
            .position(|s| s.symbol == symbol && s.timeframe == timeframe)
        {
            let existing = self.rates.remove(pos);
            merged.extend(existing.rates.into_iter().map(|r| (r.time, r)));
        }
        merged.extend(rates.into_iter().map(|r| (r.time, r)));

        let rates: Vec<Rate> = merged.into_values().collect();
        let count = rates.len();
        self.rates.push(RateSeries {
            symbol,
            timeframe,
            rates,
        });
        self.rates
            .sort_by(|a, b| (&a.symbol, a.timeframe).cmp(&(&b.symbol, b.timeframe)));
        count
    }

    /// 틱 데이터를 로드합니다. 같은 시각의 틱은 나중 값이 남습니다.
    pub fn add_ticks(&mut self, symbol: &str, ticks: Vec<Tick>) -> usize {
        let symbol = symbol.to_uppercase();
        let mut merged: BTreeMap<DateTime<Utc>, Tick> = BTreeMap::new();

        if let Some(pos) = self.ticks.iter().position(|s| s.symbol == symbol) {
            let existing = self.ticks.remove(pos);
            merged.extend(existing.ticks.into_iter().map(|t| (t.time, t)));
        }
        merged.extend(ticks.into_iter().map(|t| (t.time, t)));

        let ticks: Vec<Tick> = merged.into_values().collect();
        let count = ticks.len();
        self.ticks.push(TickSeries { symbol, ticks });
        self.ticks.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        count
    }

    /// 데이터가 로드된 심볼 목록.
    pub fn symbols(&self) -> Vec<String> {
        self.rates
            .iter()
            .map(|s| s.symbol.clone())
            .chain(self.ticks.iter().map(|s| s.symbol.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 심볼에 로드된 타임프레임 (짧은 것부터).
    pub fn timeframes(&self, symbol: &str) -> Vec<Timeframe> {
        let symbol = symbol.to_uppercase();
        let mut timeframes: Vec<Timeframe> = self
            .rates
            .iter()
            .filter(|s| s.symbol == symbol)
            .map(|s| s.timeframe)
            .collect();
        timeframes.sort();
        timeframes
    }

    /// 로드된 캔들 수.
    pub fn rates_count(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.rate_series(symbol, timeframe)
            .map(|s| s.rates.len())
            .unwrap_or(0)
    }

    /// 로드된 틱 수.
    pub fn ticks_count(&self, symbol: &str) -> usize {
        self.tick_series(symbol).map(|s| s.ticks.len()).unwrap_or(0)
    }

    /// 저장소가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty() && self.ticks.is_empty()
    }

    /// `now`에서 `start_pos`개 이전 캔들을 끝으로 하는 `count`개 캔들 (시간순).
    ///
    /// `start_pos = 0`은 `now`에 진행 중인 캔들입니다.
    pub fn get_rates_from_pos(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
        start_pos: usize,
        count: usize,
    ) -> BacktestResult<Vec<Rate>> {
        let series = self.require_rates(symbol, timeframe)?;
        let visible = visible_rates(&series.rates, now);

        if start_pos.checked_add(count).map_or(true, |requested| requested > visible) {
            return Err(BacktestError::InsufficientData {
                symbol: series.symbol.clone(),
                timeframe,
                requested: start_pos.saturating_add(count),
                available: visible,
            });
        }

        let end = visible - start_pos;
        Ok(self.rates_as_of(series, end - count, end, now))
    }

    /// `date_from` 이하 시각의 마지막 `count`개 캔들 (시간순).
    pub fn get_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> BacktestResult<Vec<Rate>> {
        let series = self.require_rates(symbol, timeframe)?;
        let visible = visible_rates(&series.rates, date_from.min(now));

        if count > visible {
            return Err(BacktestError::InsufficientData {
                symbol: series.symbol.clone(),
                timeframe,
                requested: count,
                available: visible,
            });
        }

        Ok(self.rates_as_of(series, visible - count, visible, now))
    }

    /// `date_from <= time <= date_to` 캔들. `date_to`는 `now`로 제한됩니다.
    pub fn get_rates_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Rate>> {
        let series = self.require_rates(symbol, timeframe)?;
        let date_to = date_to.min(now);
        if date_from > date_to {
            return Ok(Vec::new());
        }

        let lo = series.rates.partition_point(|r| r.time < date_from);
        let hi = series.rates.partition_point(|r| r.time <= date_to);
        Ok(self.rates_as_of(series, lo, hi, now))
    }

    /// `date_from`부터 최대 `count`개 틱. `now` 이후 틱은 제외됩니다.
    pub fn get_ticks_from(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> BacktestResult<Vec<Tick>> {
        let series = self.require_ticks(symbol)?;
        let lo = series.ticks.partition_point(|t| t.time < date_from);
        let hi = series.ticks.partition_point(|t| t.time <= now);
        if lo >= hi {
            return Ok(Vec::new());
        }
        let end = hi.min(lo.saturating_add(count));
        Ok(series.ticks[lo..end].to_vec())
    }

    /// `date_from <= time <= date_to` 틱. `date_to`는 `now`로 제한됩니다.
    pub fn get_ticks_range(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> BacktestResult<Vec<Tick>> {
        let series = self.require_ticks(symbol)?;
        let date_to = date_to.min(now);
        if date_from > date_to {
            return Ok(Vec::new());
        }

        let lo = series.ticks.partition_point(|t| t.time < date_from);
        let hi = series.ticks.partition_point(|t| t.time <= date_to);
        Ok(series.ticks[lo..hi].to_vec())
    }

    /// `now` 시점의 최신 호가.
    ///
    /// 틱 시리즈가 없거나 아직 보이는 틱이 없으면 가장 짧은 타임프레임의 마지막 캔들에서
    /// `bid = close`, `ask = close + spread * point`로 만듭니다. 진행 중인 캔들이면
    /// 부분 캔들의 종가(하위 데이터가 없으면 시가)를 씁니다.
    pub fn tick_at(&self, symbol: &str, now: DateTime<Utc>, point: Price) -> Option<Tick> {
        if let Some(series) = self.tick_series(symbol) {
            let visible = series.ticks.partition_point(|t| t.time <= now);
            if visible > 0 {
                return Some(series.ticks[visible - 1].clone());
            }
        }

        let symbol = symbol.to_uppercase();
        self.rates
            .iter()
            .filter(|s| s.symbol == symbol)
            .min_by_key(|s| s.timeframe)
            .and_then(|series| {
                let visible = visible_rates(&series.rates, now);
                (visible > 0).then(|| {
                    let bar = self.rate_as_of(series, visible - 1, now);
                    Tick {
                        time: bar.time,
                        bid: bar.close,
                        ask: bar.close + point * Decimal::from(bar.spread),
                        last: bar.close,
                        volume: bar.tick_volume,
                    }
                })
            })
    }

    /// `rates[lo..hi]`를 `now` 시점에 보이는 모습으로 복사합니다.
    fn rates_as_of(&self, series: &RateSeries, lo: usize, hi: usize, now: DateTime<Utc>) -> Vec<Rate> {
        (lo..hi).map(|i| self.rate_as_of(series, i, now)).collect()
    }

    fn rate_as_of(&self, series: &RateSeries, index: usize, now: DateTime<Utc>) -> Rate {
        let bar = &series.rates[index];
        if bar_end(series.timeframe, bar.time) <= now {
            bar.clone()
        } else {
            self.forming_rate(series, bar, now)
        }
    }

    /// 진행 중인 캔들을 `now`까지의 하위 데이터로 다시 만듭니다.
    ///
    /// 틱이 있으면 매수 호가로, 없으면 가장 짧은 하위 타임프레임 캔들로 고가/저가/종가를
    /// 채웁니다. 하위 캔들도 진행 중이면 그 시가만 씁니다.
    fn forming_rate(&self, series: &RateSeries, bar: &Rate, now: DateTime<Utc>) -> Rate {
        let mut partial = Rate::new(bar.time, bar.open, bar.open, bar.open, bar.open, 0)
            .with_spread(bar.spread);

        if let Some(ticks) = self.tick_series(&series.symbol) {
            let lo = ticks.ticks.partition_point(|t| t.time < bar.time);
            let hi = ticks.ticks.partition_point(|t| t.time <= now);
            if lo < hi {
                for tick in &ticks.ticks[lo..hi] {
                    absorb(&mut partial, tick.bid, tick.bid, tick.bid);
                    partial.tick_volume += 1;
                }
                return partial;
            }
        }

        let finer = self
            .rates
            .iter()
            .filter(|s| s.symbol == series.symbol && s.timeframe < series.timeframe)
            .min_by_key(|s| s.timeframe);
        if let Some(finer) = finer {
            let lo = finer.rates.partition_point(|r| r.time < bar.time);
            let hi = finer.rates.partition_point(|r| r.time <= now);
            for sub in &finer.rates[lo..hi] {
                if bar_end(finer.timeframe, sub.time) <= now {
                    absorb(&mut partial, sub.high, sub.low, sub.close);
                    partial.tick_volume += sub.tick_volume;
                    partial.real_volume += sub.real_volume;
                } else {
                    absorb(&mut partial, sub.open, sub.open, sub.open);
                }
            }
        }
        partial
    }

    fn rate_series(&self, symbol: &str, timeframe: Timeframe) -> Option<&RateSeries> {
        let symbol = symbol.to_uppercase();
        self.rates
            .iter()
            .find(|s| s.symbol == symbol && s.timeframe == timeframe)
    }

    fn tick_series(&self, symbol: &str) -> Option<&TickSeries> {
        let symbol = symbol.to_uppercase();
        self.ticks.iter().find(|s| s.symbol == symbol)
    }

    fn require_rates(&self, symbol: &str, timeframe: Timeframe) -> BacktestResult<&RateSeries> {
        self.rate_series(symbol, timeframe)
            .ok_or_else(|| BacktestError::NoData(format!("{} {}", symbol, timeframe)))
    }

    fn require_ticks(&self, symbol: &str) -> BacktestResult<&TickSeries> {
        self.tick_series(symbol)
            .ok_or_else(|| BacktestError::NoData(format!("{} ticks", symbol)))
    }
}

/// `now` 이하 시각을 가진 캔들 수.
fn visible_rates(rates: &[Rate], now: DateTime<Utc>) -> usize {
    rates.partition_point(|r| r.time <= now)
}

/// 캔들이 끝나는 시각. 월봉은 달력 기준입니다.
fn bar_end(timeframe: Timeframe, time: DateTime<Utc>) -> DateTime<Utc> {
    match timeframe {
        Timeframe::MN1 => time
            .checked_add_months(Months::new(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        _ => time + Duration::seconds(timeframe.as_secs()),
    }
}

fn absorb(rate: &mut Rate, high: Price, low: Price, close: Price) {
    rate.high = rate.high.max(high);
    rate.low = rate.low.min(low);
    rate.close = close;
}
