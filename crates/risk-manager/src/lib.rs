//! Risk Manager
//!
//! Per-trade bounds, daily volume caps, and position exposure caps applied to
//! every mirrored order before submission.

pub mod clamp;
pub mod daily_volume;

pub use clamp::{Candidate, ClampPipeline, ClampRejection, ClampStage};
pub use daily_volume::DailyVolumeCounter;
