//! 엔진 불변식 속성 테스트.
//!
//! 1. 커서 결정성: `fast_forward(n)` == `next()` n회
//! 2. 구간 경계: `go_to` 결과는 항상 `[start, end)` 안
//! 3. 계좌 항등식: equity == balance + profit, margin_free == equity - margin
//! 4. 주문 원자성: 실패한 `order_send`(진입, 청산, 손절/익절 수정)는 계좌와 포지션을 바꾸지 않음

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_backtest::{BacktestEngine, Clock, Span};
use trader_core::{Rate, Timeframe, TradeRequest};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
}

fn engine(balance: Decimal) -> BacktestEngine {
    let span = Span::new(start(), start() + Duration::hours(2), 60).unwrap();
    let mut engine = BacktestEngine::new(span);
    let rates = (0..120)
        .map(|i| {
            let open = dec!(100) + Decimal::from(i % 7);
            Rate::new(
                start() + Duration::minutes(i),
                open,
                open + dec!(2),
                open - dec!(2),
                open + dec!(1),
                1,
            )
            .with_spread(3)
        })
        .collect();
    engine.add_rates("BTCUSD", Timeframe::M1, rates);
    engine.setup_account(balance).unwrap();
    engine
}

// ── 계좌 작업 ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum AccountOp {
    Deposit(Decimal),
    Withdraw(Decimal),
    Update(Option<Decimal>, Option<Decimal>),
}

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (-10_000i64..100_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_op() -> impl Strategy<Value = AccountOp> {
    prop_oneof![
        arb_amount().prop_map(AccountOp::Deposit),
        arb_amount().prop_map(AccountOp::Withdraw),
        (proptest::option::of(arb_amount()), proptest::option::of(arb_amount()))
            .prop_map(|(p, m)| AccountOp::Update(p, m)),
    ]
}

// ── 주문 종류 ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum OrderKind {
    Open { volume: Decimal, sell: bool },
    Close { volume: Decimal, known: bool },
    Modify { sl: Decimal, tp: Decimal, known: bool },
}

fn arb_price() -> impl Strategy<Value = Decimal> {
    (0i64..20_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_order() -> impl Strategy<Value = OrderKind> {
    let volume = (1i64..1_000_000).prop_map(|v| Decimal::new(v, 3));
    prop_oneof![
        (volume.clone(), any::<bool>()).prop_map(|(volume, sell)| OrderKind::Open { volume, sell }),
        (volume, any::<bool>()).prop_map(|(volume, known)| OrderKind::Close { volume, known }),
        (arb_price(), arb_price(), any::<bool>())
            .prop_map(|(sl, tp, known)| OrderKind::Modify { sl, tp, known }),
    ]
}

proptest! {
    #[test]
    fn fast_forward_matches_repeated_next(steps in 0u64..200, speed in 1u32..600) {
        let span = Span::new(start(), start() + Duration::hours(3), speed).unwrap();
        let mut a = Clock::new(span);
        let mut b = Clock::new(span);

        a.fast_forward(steps);
        for _ in 0..steps {
            b.next();
        }
        prop_assert_eq!(a.cursor(), b.cursor());
        prop_assert_eq!(a.is_exhausted(), b.is_exhausted());
    }

    #[test]
    fn engine_fast_forward_matches_repeated_next(steps in 0u64..150) {
        let mut a = engine(dec!(1000));
        let mut b = engine(dec!(1000));

        a.fast_forward(steps).unwrap();
        for _ in 0..steps {
            if b.next().unwrap().is_none() {
                break;
            }
        }
        prop_assert_eq!(a.cursor(), b.cursor());
        prop_assert_eq!(a.state(), b.state());
    }

    #[test]
    fn go_to_stays_in_span(offset in -1_000_000i64..1_000_000, speed in 1u32..3_600) {
        let end = start() + Duration::days(1);
        let span = Span::new(start(), end, speed).unwrap();
        let mut clock = Clock::new(span);

        let cursor = clock.go_to(start() + Duration::seconds(offset));
        prop_assert!(cursor.time >= start());
        prop_assert!(cursor.time < end);
        prop_assert_eq!(cursor.index % i64::from(speed), 0);
    }

    #[test]
    fn account_identity_holds(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut engine = engine(dec!(100));
        for op in ops {
            let _ = match op {
                AccountOp::Deposit(amount) => engine.deposit(amount),
                AccountOp::Withdraw(amount) => engine.withdraw(amount),
                AccountOp::Update(profit, margin) => engine.update_account(profit, margin),
            };
            let info = engine.account_info();
            prop_assert_eq!(info.equity, info.balance + info.profit);
            prop_assert_eq!(info.margin_free, info.equity - info.margin);
            prop_assert!(info.balance >= Decimal::ZERO);
        }
    }

    #[test]
    fn failed_order_is_atomic(
        kind in arb_order(),
        steps in 0u64..50,
    ) {
        let mut engine = engine(dec!(5));
        let held = engine
            .order_send(TradeRequest::buy("BTCUSD", dec!(0.02)).with_stops(dec!(90), dec!(120)))
            .unwrap();
        prop_assert!(held.is_done());
        engine.fast_forward(steps).unwrap();

        let request = match kind {
            OrderKind::Open { volume, sell: true } => TradeRequest::sell("BTCUSD", volume),
            OrderKind::Open { volume, sell: false } => TradeRequest::buy("BTCUSD", volume),
            OrderKind::Close { volume, known } => {
                let ticket = if known { held.order } else { held.order + 1_000 };
                TradeRequest::sell("BTCUSD", volume).closing(ticket)
            }
            OrderKind::Modify { sl, tp, known } => {
                let ticket = if known { held.order } else { held.order + 1_000 };
                TradeRequest::modify_stops("BTCUSD", ticket, sl, tp)
            }
        };

        let account_before = engine.account_info();
        let positions_before = engine.positions_get(None);
        let deals_before = engine.deals().len();
        let orders_before = engine.orders().len();

        let result = engine.order_send(request).unwrap();
        if !result.is_done() {
            prop_assert_eq!(engine.account_info(), account_before);
            prop_assert_eq!(engine.positions_get(None), positions_before);
            prop_assert_eq!(engine.deals().len(), deals_before);
            prop_assert_eq!(engine.orders().len(), orders_before);
            prop_assert_eq!(result.order, 0);
        }
    }
}
