//! Trading Engine
//!
//! Trade mirroring, persisted state, and redemption batching for the copy bot.

pub mod copy_trader;
pub mod executor;
pub mod position_cache;
pub mod redemption;
pub mod sizing;
pub mod state;

pub use copy_trader::{BatchSummary, CopyTrader, MirrorOutcome, MirrorStats};
pub use executor::{ExecutionMetrics, ExecutorConfig, FailureHint, OrderExecution, PaperExecutor};
pub use position_cache::PositionCache;
pub use redemption::{
    batch_positions, DryRunRelay, RedemptionBatcher, SettlementInstruction, SettlementRelay,
    SweepReport,
};
pub use sizing::Sizer;
pub use state::{
    JsonFileStore, MemoryStateStore, MirrorLedger, PersistedState, RedeemLedger, StateHandle,
    StateStore,
};
