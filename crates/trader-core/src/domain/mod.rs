//! 백테스트 터미널의 도메인 모델.

mod account;
mod deal;
mod market_data;
mod order;
mod position;
mod symbol;

pub use account::*;
pub use deal::*;
pub use market_data::*;
pub use order::*;
pub use position::*;
pub use symbol::*;
