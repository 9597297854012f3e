//! 스냅샷 내용 출력.

use anyhow::{Context, Result};
use std::path::Path;

use trader_backtest::{snapshot, BacktestReport};

/// 스냅샷의 커서, 계좌, 포지션을 출력합니다.
pub fn inspect_snapshot(path: &Path) -> Result<()> {
    let engine = snapshot::load(path)
        .with_context(|| format!("Failed to load snapshot: {}", path.display()))?;

    let cursor = engine.cursor();
    let span = engine.span();
    let info = engine.account_info();

    println!("\n📋 스냅샷: {}", path.display());
    println!("═══════════════════════════════════════════════════════════════");
    println!("  구간      {} ~ {} ({}초 단위)", span.start, span.end, span.speed);
    println!("  커서      {} (index {})", cursor.time, cursor.index);
    println!("  상태      {:?}", engine.state());
    println!();
    println!("  계좌 #{} ({}, 1:{})", info.login, info.currency, info.leverage);
    println!("  ─────────────────────────────────────────────────────────────");
    println!("  balance      {}", info.balance);
    println!("  equity       {}", info.equity);
    println!("  profit       {}", info.profit);
    println!("  margin       {}", info.margin);
    println!("  margin_free  {}", info.margin_free);
    println!("  margin_level {}%", info.margin_level.round_dp(2));
    println!();

    let positions = engine.positions_get(None);
    println!("  오픈 포지션 {}개", positions.len());
    println!("  ─────────────────────────────────────────────────────────────");
    for p in &positions {
        println!(
            "  #{:<6} {:<10} {:<4} {:>8} @ {:<12} now {:<12} sl {:<10} tp {:<10} P/L {}",
            p.ticket,
            p.symbol,
            p.position_type,
            p.volume,
            p.price_open,
            p.price_current,
            p.sl,
            p.tp,
            p.profit
        );
    }
    println!("═══════════════════════════════════════════════════════════════");
    println!("\n{}", BacktestReport::from_engine(&engine));

    Ok(())
}
