//! CLI 명령어 구현 모듈.

pub mod inspect;
pub mod resume;
pub mod run;
