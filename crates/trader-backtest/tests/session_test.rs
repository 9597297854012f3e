//! 백테스트 세션 통합 테스트.
//!
//! 공개 API만 사용합니다:
//! - 엔진 생성, 계좌 설정, 입금
//! - 주문 전송과 커서 전진
//! - 스냅샷 저장/복원 후 이어서 실행
//! - 설정 파일과 CSV에서 엔진 구성

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Write;
use trader_backtest::{
    snapshot, BacktestEngine, BacktestError, BacktestReport, EngineState, Span,
};
use trader_core::{BacktestConfig, Rate, Retcode, Timeframe, TradeRequest};

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
}

fn end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 7, 0, 0, 0).unwrap()
}

/// 시작 시각부터 `count`분 동안의 BTCUSD 1분봉 (톱니 모양 가격).
fn btc_rates(count: i64) -> Vec<Rate> {
    (0..count)
        .map(|i| {
            let close = dec!(42000) + Decimal::from(i % 50) * dec!(2.5);
            Rate::new(
                start() + Duration::minutes(i),
                close - dec!(1),
                close + dec!(5),
                close - dec!(5),
                close,
                100,
            )
            .with_spread(20)
        })
        .collect()
}

fn engine() -> BacktestEngine {
    let span = Span::new(start(), end(), 60).unwrap();
    let mut engine = BacktestEngine::new(span);
    engine.add_rates("BTCUSD", Timeframe::M1, btc_rates(600));
    engine
}

// ============================================================================
// 기본 시나리오
// ============================================================================

#[test]
fn test_example_scenario() {
    let mut engine = engine();

    engine.setup_account(dec!(100)).unwrap();
    let info = engine.account_info();
    assert_eq!(info.equity, dec!(100));
    assert_eq!(info.margin, dec!(0));

    engine.deposit(dec!(50)).unwrap();
    assert_eq!(engine.account_info().balance, dec!(150));

    let result = engine
        .order_send(TradeRequest::buy("BTCUSD", dec!(0.01)))
        .unwrap();
    assert_eq!(result.retcode.code(), 10009);
    // 진행 중인 첫 캔들의 시가 41999 + 스프레드 20포인트
    assert_eq!(result.price, dec!(41999.2));
    assert_eq!(engine.positions_total(), 1);
    assert_eq!(engine.positions_get(None)[0].ticket, result.order);

    let cursor = engine.fast_forward(100).unwrap();
    assert_eq!(cursor.time, start() + Duration::seconds(100 * 60));
    assert_eq!(engine.state(), EngineState::Running);

    let info = engine.account_info();
    assert_eq!(info.equity, info.balance + info.profit);
    assert_eq!(info.margin_free, info.equity - info.margin);
}

#[test]
fn test_order_check_does_not_mutate() {
    let mut engine = engine();
    engine.setup_account(dec!(100)).unwrap();

    let check = engine
        .order_check(&TradeRequest::buy("BTCUSD", dec!(0.01)))
        .unwrap();
    assert!(check.is_ok());
    assert_eq!(check.code(), 0);
    assert!(check.margin > Decimal::ZERO);

    let too_big = engine
        .order_check(&TradeRequest::buy("BTCUSD", dec!(10)))
        .unwrap();
    assert_eq!(too_big.retcode, Retcode::NoMoney);
    assert_eq!(too_big.code(), 10019);

    assert_eq!(engine.positions_total(), 0);
    assert_eq!(engine.account_info().margin, dec!(0));
}

#[test]
fn test_no_look_ahead() {
    let mut engine = engine();
    engine.setup_account(dec!(100)).unwrap();
    engine.fast_forward(10).unwrap();

    let range = engine
        .get_rates_range("BTCUSD", Timeframe::M1, start(), end())
        .unwrap();
    assert_eq!(range.len(), 11);
    assert!(range.iter().all(|r| r.time <= engine.now()));

    // 현재 캔들은 시가까지만, 지난 캔들은 원본 그대로
    let forming = range.last().unwrap();
    assert_eq!(forming.time, engine.now());
    assert_eq!(forming.close, forming.open);
    assert_eq!(forming.high, forming.open);
    let finished = &range[range.len() - 2];
    assert_eq!(finished.close, finished.open + dec!(1));
    assert_eq!(finished.high, finished.close + dec!(5));

    let tick = engine.symbol_info_tick("BTCUSD").unwrap();
    assert_eq!(tick.bid, forming.open);

    let err = engine
        .get_rates_from_pos("BTCUSD", Timeframe::M1, 0, 12)
        .unwrap_err();
    assert!(matches!(err, BacktestError::InsufficientData { available: 11, .. }));

    let err = engine
        .get_rates_from_pos("BTCUSD", Timeframe::M1, usize::MAX, 1)
        .unwrap_err();
    assert!(matches!(err, BacktestError::InsufficientData { .. }));
}

#[test]
fn test_go_to_and_fast_forward_agree() {
    let mut stepped = engine();
    let mut jumped = engine();
    for engine in [&mut stepped, &mut jumped] {
        engine.setup_account(dec!(1000)).unwrap();
        // 시가 41999에서 3분 뒤 42006.5 도달
        engine
            .order_send(TradeRequest::buy("BTCUSD", dec!(0.1)).with_stops(dec!(41000), dec!(42005)))
            .unwrap();
    }

    stepped.fast_forward(30).unwrap();
    jumped.go_to(start() + Duration::minutes(30)).unwrap();

    assert_eq!(jumped.cursor(), stepped.cursor());
    assert_eq!(jumped.positions_total(), 0);
    assert_eq!(jumped.deals(), stepped.deals());
    assert_eq!(jumped.account_info(), stepped.account_info());
}

#[test]
fn test_span_exhaustion() {
    let span = Span::new(start(), start() + Duration::minutes(5), 60).unwrap();
    let mut engine = BacktestEngine::new(span);
    engine.add_rates("BTCUSD", Timeframe::M1, btc_rates(5));
    engine.setup_account(dec!(100)).unwrap();

    let cursor = engine.fast_forward(1_000).unwrap();
    assert_eq!(cursor.time, start() + Duration::minutes(4));
    assert!(engine.is_exhausted());
    assert_eq!(engine.state(), EngineState::Finished);

    let err = engine
        .order_send(TradeRequest::buy("BTCUSD", dec!(0.01)))
        .unwrap_err();
    assert!(err.is_fatal());

    // 조회는 종료 후에도 가능
    assert!(engine.symbol_info_tick("BTCUSD").is_some());
}

// ============================================================================
// 스냅샷
// ============================================================================

#[test]
fn test_snapshot_resume_matches_uninterrupted_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut original = engine();
    original.setup_account(dec!(1000)).unwrap();
    original
        .order_send(TradeRequest::buy("BTCUSD", dec!(0.05)).with_stops(dec!(41000), dec!(43000)))
        .unwrap();
    original.fast_forward(37).unwrap();
    original
        .order_send(TradeRequest::sell("BTCUSD", dec!(0.02)))
        .unwrap();

    snapshot::save(&original, &path).unwrap();
    let mut resumed = snapshot::load(&path).unwrap();

    assert_eq!(resumed.cursor(), original.cursor());
    assert_eq!(resumed.account_info(), original.account_info());
    assert_eq!(resumed.positions_get(None), original.positions_get(None));

    original.fast_forward(120).unwrap();
    resumed.fast_forward(120).unwrap();

    assert_eq!(resumed.cursor(), original.cursor());
    assert_eq!(resumed.account_info(), original.account_info());
    assert_eq!(resumed.deals(), original.deals());
    assert_eq!(
        resumed
            .get_rates_from_pos("BTCUSD", Timeframe::M1, 0, 30)
            .unwrap(),
        original
            .get_rates_from_pos("BTCUSD", Timeframe::M1, 0, 30)
            .unwrap()
    );

    // 다음 티켓 번호도 이어짐
    let a = original.order_send(TradeRequest::buy("BTCUSD", dec!(0.01))).unwrap();
    let b = resumed.order_send(TradeRequest::buy("BTCUSD", dec!(0.01))).unwrap();
    assert_eq!(a.order, b.order);
}

#[test]
fn test_wrap_up_then_resume() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wrapped.json");

    let mut engine = engine();
    engine.setup_account(dec!(500)).unwrap();
    engine.fast_forward(3).unwrap();
    engine.wrap_up(&path).unwrap();
    assert_eq!(engine.state(), EngineState::Finished);

    let mut resumed = snapshot::load(&path).unwrap();
    assert_eq!(resumed.state(), EngineState::Running);
    assert_eq!(resumed.cursor(), engine.cursor());
    resumed.next().unwrap();
    assert_eq!(resumed.now(), start() + Duration::minutes(4));
}

// ============================================================================
// 설정 / CSV
// ============================================================================

#[test]
fn test_engine_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("btcusd_m1.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "time,open,high,low,close,tick_volume,spread").unwrap();
    for i in 0..10 {
        let time = start() + Duration::minutes(i);
        writeln!(file, "{},{},{},{},{},10,0", time.to_rfc3339(), 100 + i, 101 + i, 99 + i, 100 + i).unwrap();
    }
    drop(file);

    let toml = format!(
        r#"
[span]
start = "2024-02-01T00:00:00Z"
end = "2024-02-01T00:10:00Z"
speed = 60

[account]
balance = 1000
leverage = 50
login = 7

[[symbols]]
name = "btcusd"
contract_size = 1

[[data]]
symbol = "BTCUSD"
kind = "rates"
timeframe = "M1"
path = "{}"
"#,
        csv_path.display().to_string().replace('\\', "/")
    );

    let config = BacktestConfig::from_toml_str(&toml).unwrap();
    let mut engine = BacktestEngine::from_config(&config).unwrap();
    assert_eq!(engine.state(), EngineState::Uninitialized);

    engine.setup_account(config.account.balance).unwrap();
    assert_eq!(engine.account_info().login, 7);
    assert_eq!(engine.account_info().leverage, 50);

    engine.fast_forward(4).unwrap();
    let tick = engine.symbol_info_tick("BTCUSD").unwrap();
    assert_eq!(tick.bid, dec!(104));

    let margin = engine
        .order_calc_margin(trader_core::OrderType::Buy, "BTCUSD", dec!(1), dec!(100))
        .unwrap();
    assert_eq!(margin, dec!(2));

    let report = BacktestReport::from_engine(&engine);
    assert_eq!(report.net_deposits, dec!(1000));
    assert_eq!(report.closed_trades, 0);
}
