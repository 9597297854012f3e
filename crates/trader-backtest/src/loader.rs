//! CSV 과거 데이터 로더.
//!
//! 캔들: `time,open,high,low,close,tick_volume[,spread,real_volume]`
//! 틱: `time,bid,ask[,last,volume]`
//!
//! `time`은 유닉스 초 또는 RFC3339 문자열입니다.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use trader_core::{Price, Rate, Tick};

use crate::error::{BacktestError, BacktestResult};

#[derive(Debug, Deserialize)]
struct RateRecord {
    time: String,
    open: String,
    high: String,
    low: String,
    close: String,
    tick_volume: u64,
    #[serde(default)]
    spread: Option<u32>,
    #[serde(default)]
    real_volume: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TickRecord {
    time: String,
    bid: String,
    ask: String,
    #[serde(default)]
    last: Option<String>,
    #[serde(default)]
    volume: Option<u64>,
}

/// CSV 파일에서 캔들을 읽습니다.
pub fn read_rates_csv<P: AsRef<Path>>(path: P) -> BacktestResult<Vec<Rate>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    parse_rates(reader)
}

/// CSV 파일에서 틱을 읽습니다.
pub fn read_ticks_csv<P: AsRef<Path>>(path: P) -> BacktestResult<Vec<Tick>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    parse_ticks(reader)
}

/// 임의의 입력에서 캔들 CSV를 읽습니다.
pub fn parse_rates<R: Read>(mut reader: csv::Reader<R>) -> BacktestResult<Vec<Rate>> {
    let mut rates = Vec::new();
    for record in reader.deserialize::<RateRecord>() {
        let record = record?;
        let high = parse_price(&record.high)?;
        let low = parse_price(&record.low)?;
        if high < low {
            return Err(BacktestError::Csv(format!(
                "high {} below low {} at {}",
                high, low, record.time
            )));
        }
        rates.push(Rate {
            time: parse_time(&record.time)?,
            open: parse_price(&record.open)?,
            high,
            low,
            close: parse_price(&record.close)?,
            tick_volume: record.tick_volume,
            spread: record.spread.unwrap_or(0),
            real_volume: record.real_volume.unwrap_or(0),
        });
    }
    Ok(rates)
}

/// 임의의 입력에서 틱 CSV를 읽습니다.
pub fn parse_ticks<R: Read>(mut reader: csv::Reader<R>) -> BacktestResult<Vec<Tick>> {
    let mut ticks = Vec::new();
    for record in reader.deserialize::<TickRecord>() {
        let record = record?;
        ticks.push(Tick {
            time: parse_time(&record.time)?,
            bid: parse_price(&record.bid)?,
            ask: parse_price(&record.ask)?,
            last: match record.last.as_deref() {
                Some(last) if !last.is_empty() => parse_price(last)?,
                _ => Decimal::ZERO,
            },
            volume: record.volume.unwrap_or(0),
        });
    }
    Ok(ticks)
}

/// 가격 문자열을 Decimal로 직접 파싱합니다.
fn parse_price(value: &str) -> BacktestResult<Price> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| BacktestError::Csv(format!("invalid price '{}': {}", value, e)))
}

fn parse_time(value: &str) -> BacktestResult<DateTime<Utc>> {
    if let Ok(secs) = value.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| BacktestError::Csv(format!("timestamp out of range: {}", secs)));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| BacktestError::Csv(format!("invalid time '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(data.as_bytes())
    }

    #[test]
    fn test_parse_rates() {
        let data = "time,open,high,low,close,tick_volume,spread,real_volume\n\
                    1706745600,42000.5,42010,41990,42005.25,120,15,0\n\
                    2024-02-01T00:01:00Z,42005.25,42020,42000,42015,80\n";
        let rates = parse_rates(reader(data)).unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].time, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(rates[0].close, dec!(42005.25));
        assert_eq!(rates[0].spread, 15);
        assert_eq!(rates[1].spread, 0);
    }

    #[test]
    fn test_parse_ticks() {
        let data = "time,bid,ask\n2024-02-01T00:00:05+00:00,1.08450,1.08452\n";
        let ticks = parse_ticks(reader(data)).unwrap();
        assert_eq!(ticks[0].ask, dec!(1.08452));
        assert_eq!(ticks[0].volume, 0);
    }

    #[test]
    fn test_rejects_bad_rows() {
        assert!(parse_rates(reader("time,open,high,low,close,tick_volume\nyesterday,1,2,0,1,1\n")).is_err());
        assert!(parse_rates(reader("time,open,high,low,close,tick_volume\n0,1,1,2,1,1\n")).is_err());
        assert!(parse_ticks(reader("time,bid,ask\n0,abc,1\n")).is_err());
    }

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,open,high,low,close,tick_volume").unwrap();
        writeln!(file, "1706745600,1,2,0.5,1.5,10").unwrap();
        file.flush().unwrap();

        let rates = read_rates_csv(file.path()).unwrap();
        assert_eq!(rates.len(), 1);
        assert!(rates[0].is_bullish());
    }
}
