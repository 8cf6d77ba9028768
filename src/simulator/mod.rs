//! Phase 3: The Simulator
//!
//! Responsible for:
//! - Pricing whole cyclic paths against the on-chain quoter
//! - Re-quoting the cached paths in parallel workers
//! - Flagging routes whose adjusted output clears the profit bound

pub mod quoter;
pub mod scanner;

pub use quoter::{PathQuoter, QuoteError, UniV3PathQuoter};
pub use scanner::{
    adjusted_output, is_profitable, partition, profit_bound, PassReport, ProfitableRoute,
    QuoteScanner, ScanParams, ScanTarget, Worker,
};
