//! Poly-Mirror: Polymarket trade mirroring and redemption bot
//!
//! This is the root crate that provides benchmark and integration test access
//! to the internal crates. For actual functionality, use the crates directly:
//!
//! - `polymarket-core`: Core types, configuration, Data API client
//! - `risk-manager`: Trade bounds, daily volume and position exposure clamps
//! - `trading-engine`: Sizing, mirror engine, persisted state, redemption batching
//! - `copy-bot`: The service binary running the mirror and redeem loops

// Re-export for benchmarks and integration tests
pub use polymarket_core as core;
pub use risk_manager as risk;
pub use trading_engine as trading;
