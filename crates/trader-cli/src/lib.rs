//! 백테스트 터미널 CLI.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 설정 파일 기반 백테스트 실행
//! - 스냅샷에서 재개
//! - 스냅샷 점검

pub mod commands;
