//! 엔진 스냅샷 저장/복원.
//!
//! 엔진 전체 상태(기간, 커서, 계좌, 포지션, 거래 기록, 로드된 데이터)를 하나의
//! JSON 파일로 저장합니다. 같은 구현의 리더만 호환을 보장합니다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;
use trader_core::{Deal, HistoryOrder, Position, SymbolInfo};

use crate::account::AccountSimulator;
use crate::clock::{Clock, Span};
use crate::engine::{BacktestEngine, EngineState};
use crate::error::{BacktestError, BacktestResult};
use crate::store::HistoricalDataStore;

/// 현재 스냅샷 형식 버전.
pub const SNAPSHOT_VERSION: u32 = 1;

/// 직렬화된 엔진 상태.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub span: Span,
    pub index: i64,
    #[serde(default)]
    pub exhausted: bool,
    pub state: EngineState,
    pub account: AccountSimulator,
    pub positions: Vec<Position>,
    pub orders: Vec<HistoryOrder>,
    pub deals: Vec<Deal>,
    pub next_ticket: u64,
    pub symbols: Vec<SymbolInfo>,
    pub store: HistoricalDataStore,
}

impl Snapshot {
    /// 엔진 상태를 복사합니다.
    pub fn capture(engine: &BacktestEngine) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            span: *engine.clock.span(),
            index: engine.clock.cursor().index,
            exhausted: engine.clock.is_exhausted(),
            state: engine.state,
            account: engine.account.clone(),
            positions: engine.positions.values().cloned().collect(),
            orders: engine.orders.clone(),
            deals: engine.deals.clone(),
            next_ticket: engine.next_ticket,
            symbols: engine.symbols.values().cloned().collect(),
            store: engine.store.clone(),
        }
    }

    /// 스냅샷에서 엔진을 다시 구성합니다.
    pub fn restore(self) -> BacktestResult<BacktestEngine> {
        if self.version != SNAPSHOT_VERSION {
            return Err(BacktestError::SnapshotVersion {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let clock = Clock::restore(self.span, self.index, self.exhausted)?;
        let positions: BTreeMap<u64, Position> =
            self.positions.into_iter().map(|p| (p.ticket, p)).collect();
        let symbols: BTreeMap<String, SymbolInfo> =
            self.symbols.into_iter().map(|s| (s.name.clone(), s)).collect();

        Ok(BacktestEngine {
            clock,
            state: self.state,
            store: self.store,
            symbols,
            account: self.account,
            positions,
            orders: self.orders,
            deals: self.deals,
            next_ticket: self.next_ticket,
        })
    }
}

/// 엔진 상태를 파일로 저장합니다.
pub fn save(engine: &BacktestEngine, path: &Path) -> BacktestResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let snapshot = Snapshot::capture(engine);
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &snapshot)?;
    writer.flush()?;

    info!(
        path = %path.display(),
        index = snapshot.index,
        positions = snapshot.positions.len(),
        "스냅샷 저장"
    );
    Ok(())
}

/// 파일에서 엔진을 복원합니다.
pub fn load<P: AsRef<Path>>(path: P) -> BacktestResult<BacktestEngine> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let snapshot: Snapshot = serde_json::from_reader(reader)?;

    info!(path = %path.display(), index = snapshot.index, state = ?snapshot.state, "스냅샷 로드");
    snapshot.restore()
}
