//! 스냅샷에서 백테스트 재개.
//!
//! ```bash
//! trader resume -s snapshots/session.json --steps 600
//! ```

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use trader_backtest::{snapshot, BacktestReport, EngineState, SharedEngine};

use super::run::{finish, replay, save_report};

/// 재개 CLI 설정
#[derive(Debug, Clone)]
pub struct ResumeCliConfig {
    /// 스냅샷 파일 경로
    pub snapshot_path: PathBuf,
    /// 최대 전진 단계 수 (없으면 구간 끝까지)
    pub steps: Option<u64>,
    /// N 단계마다 스냅샷 저장 (0이면 종료 시에만)
    pub every_steps: u64,
    /// 결과 저장 경로 (옵션)
    pub output_path: Option<PathBuf>,
}

/// 스냅샷을 불러와 이어서 실행
pub async fn resume_backtest(cli: &ResumeCliConfig) -> Result<BacktestReport> {
    let engine = snapshot::load(&cli.snapshot_path)
        .with_context(|| format!("Failed to load snapshot: {}", cli.snapshot_path.display()))?;

    if engine.state() == EngineState::Finished {
        bail!(
            "Session in {} already reached the end of its span ({})",
            cli.snapshot_path.display(),
            engine.now()
        );
    }
    info!(time = %engine.now(), state = ?engine.state(), "스냅샷에서 재개");

    let engine = SharedEngine::new(engine);
    replay(&engine, cli.steps, cli.every_steps, Some(&cli.snapshot_path)).await?;
    let report = finish(engine, Some(&cli.snapshot_path)).await?;

    println!("\n{}", report);
    if let Some(output_path) = &cli.output_path {
        save_report(&report, output_path)?;
    }
    Ok(report)
}
