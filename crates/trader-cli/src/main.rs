//! 백테스트 터미널 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 설정 파일로 백테스트 실행
//! trader run -c config/backtest.toml
//!
//! # 하루(1분 단위 1440 단계)만 진행하고 결과 저장
//! trader run -c config/backtest.toml --steps 1440 -o results/report.json
//!
//! # 스냅샷에서 이어서 실행
//! trader resume -s snapshots/session.json
//!
//! # 스냅샷 내용 확인
//! trader inspect -s snapshots/session.json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use trader_cli::commands::inspect::inspect_snapshot;
use trader_cli::commands::resume::{resume_backtest, ResumeCliConfig};
use trader_cli::commands::run::{run_backtest, RunCliConfig};
use trader_core::{init_logging, BacktestConfig, LogConfig};

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "Backtest terminal CLI - 과거 데이터 기반 주문 시뮬레이션", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 설정 파일로 백테스트 실행
    Run {
        /// 백테스트 설정 파일 (TOML)
        #[arg(short, long, default_value = "config/backtest.toml")]
        config: PathBuf,

        /// 최대 전진 단계 수 (기본: 구간 끝까지)
        #[arg(long)]
        steps: Option<u64>,

        /// 결과 저장 경로 (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 스냅샷에서 백테스트 재개
    Resume {
        /// 스냅샷 파일
        #[arg(short, long)]
        snapshot: PathBuf,

        /// 최대 전진 단계 수 (기본: 구간 끝까지)
        #[arg(long)]
        steps: Option<u64>,

        /// N 단계마다 스냅샷 저장 (0: 종료 시에만)
        #[arg(long, default_value = "0")]
        every: u64,

        /// 결과 저장 경로 (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 스냅샷 내용 출력
    Inspect {
        /// 스냅샷 파일
        #[arg(short, long)]
        snapshot: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env의 BACKTEST__ 변수도 설정 덮어쓰기에 사용
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            output,
        } => {
            let settings = BacktestConfig::load(&config)?;
            init_logging(LogConfig::from(&settings.logging))
                .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

            let cli = RunCliConfig {
                config_path: config,
                steps,
                output_path: output,
            };
            if let Err(e) = run_backtest(&settings, &cli).await {
                error!("Backtest failed: {:#}", e);
                return Err(e);
            }
        }

        Commands::Resume {
            snapshot,
            steps,
            every,
            output,
        } => {
            init_logging(LogConfig::from_env())
                .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

            let cli = ResumeCliConfig {
                snapshot_path: snapshot,
                steps,
                every_steps: every,
                output_path: output,
            };
            if let Err(e) = resume_backtest(&cli).await {
                error!("Resume failed: {:#}", e);
                return Err(e);
            }
        }

        Commands::Inspect { snapshot } => {
            init_logging(LogConfig::from_env())
                .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
            inspect_snapshot(&snapshot)?;
        }
    }

    Ok(())
}
