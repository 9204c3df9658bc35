//! Factor analyzers
//!
//! Pure scoring functions. Fetching and caching live in the engine; every
//! analyzer here takes already-gathered inputs and returns a `FactorResult`.

pub mod contract;
pub mod creator;
pub mod liquidity;
pub mod social;
pub mod transfer;

pub use contract::{detect_signals, score_contract};
pub use creator::score_creator;
pub use liquidity::score_liquidity;
pub use social::score_social;
pub use transfer::{analyze_transfers, score_transfers};
