//! 백테스트 실행 명령어.
//!
//! 설정 파일로 엔진을 구성하고 구간 끝(또는 지정 단계 수)까지 재생합니다.
//!
//! # 사용 예시
//!
//! ```bash
//! # 구간 끝까지 실행
//! trader run -c config/backtest.toml
//!
//! # 1440 단계(1분 단위면 하루)만 실행하고 결과 저장
//! trader run -c config/backtest.toml --steps 1440 -o report.json
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use trader_backtest::{snapshot, BacktestEngine, BacktestReport, EngineState, SharedEngine};
use trader_core::BacktestConfig;

/// 실행 CLI 설정
#[derive(Debug, Clone)]
pub struct RunCliConfig {
    /// 백테스트 설정 파일 경로
    pub config_path: PathBuf,
    /// 최대 전진 단계 수 (없으면 구간 끝까지)
    pub steps: Option<u64>,
    /// 결과 저장 경로 (옵션)
    pub output_path: Option<PathBuf>,
}

/// 백테스트 실행
pub async fn run_backtest(config: &BacktestConfig, cli: &RunCliConfig) -> Result<BacktestReport> {
    info!(config = %cli.config_path.display(), "백테스트 실행");

    let mut engine =
        BacktestEngine::from_config(config).context("Failed to build engine from config")?;
    engine
        .setup_account(config.account.balance)
        .context("Failed to set up account")?;

    let engine = SharedEngine::new(engine);
    replay(
        &engine,
        cli.steps,
        config.snapshot.every_steps,
        config.snapshot.path.as_deref(),
    )
    .await?;

    let report = finish(engine, config.snapshot.path.as_deref()).await?;

    println!("\n{}", report);
    if let Some(output_path) = &cli.output_path {
        save_report(&report, output_path)?;
        info!(path = %output_path.display(), "결과 저장");
    }

    Ok(report)
}

/// 엔진을 `steps` 단계 (없으면 구간 끝까지) 전진시킵니다.
///
/// `every_steps > 0`이면 그만큼 전진할 때마다 스냅샷을 저장합니다.
pub async fn replay(
    engine: &SharedEngine,
    steps: Option<u64>,
    every_steps: u64,
    snapshot_path: Option<&Path>,
) -> Result<()> {
    let mut remaining = steps.unwrap_or(u64::MAX);
    let chunk = match (every_steps, snapshot_path) {
        (n, Some(_)) if n > 0 => n,
        _ => remaining,
    };

    while remaining > 0 {
        let advance = chunk.min(remaining);
        let cursor = engine.fast_forward(advance).await?;
        remaining -= advance;
        debug!(index = cursor.index, time = %cursor.time, "재생 진행");

        let finished = engine.read(|e| e.state() == EngineState::Finished).await;
        if finished {
            break;
        }
        if let (true, Some(path)) = (every_steps > 0, snapshot_path) {
            engine
                .read(|e| snapshot::save(e, path))
                .await
                .with_context(|| format!("Failed to save snapshot: {}", path.display()))?;
        }
    }

    Ok(())
}

/// 요약을 만들고, 스냅샷 경로가 있으면 세션을 종료 처리합니다.
pub async fn finish(engine: SharedEngine, snapshot_path: Option<&Path>) -> Result<BacktestReport> {
    let report = engine.read(BacktestReport::from_engine).await;
    if let Some(path) = snapshot_path {
        engine
            .write(|e| e.wrap_up(path))
            .await
            .with_context(|| format!("Failed to wrap up session: {}", path.display()))?;
        println!("스냅샷 저장: {}", path.display());
    }
    Ok(report)
}

/// 결과를 JSON 파일로 저장
pub fn save_report(report: &BacktestReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use trader_backtest::Span;
    use trader_core::{Rate, Timeframe, TradeRequest};

    fn engine() -> SharedEngine {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let span = Span::new(start, start + Duration::minutes(30), 60).unwrap();
        let mut engine = BacktestEngine::new(span);
        let rates = (0..30)
            .map(|i| Rate::new(start + Duration::minutes(i), dec!(10), dec!(10), dec!(10), dec!(10), 1))
            .collect();
        engine.add_rates("BTCUSD", Timeframe::M1, rates);
        engine.setup_account(dec!(100)).unwrap();
        engine
            .order_send(TradeRequest::buy("BTCUSD", dec!(1)))
            .unwrap();
        SharedEngine::new(engine)
    }

    #[tokio::test]
    async fn test_replay_with_periodic_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let engine = engine();

        replay(&engine, Some(10), 4, Some(&path)).await.unwrap();
        assert_eq!(engine.cursor().await.index, 600);

        let saved = snapshot::load(&path).unwrap();
        assert_eq!(saved.cursor().index, 600);
        assert_eq!(saved.positions_total(), 1);
    }

    #[tokio::test]
    async fn test_replay_to_end_and_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final.json");
        let engine = engine();

        replay(&engine, None, 0, None).await.unwrap();
        let report = finish(engine, Some(&path)).await.unwrap();
        assert_eq!(report.state, EngineState::Finished);
        assert_eq!(report.open_positions, 1);

        let report_path = dir.path().join("out").join("report.json");
        save_report(&report, &report_path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(json["open_positions"], 1);
    }
}
