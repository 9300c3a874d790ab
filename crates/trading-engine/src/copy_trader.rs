//! Trade mirror engine.
//!
//! Every observed trade runs through one pass of: dedup, side filter, sizing,
//! clamping, submission. Each terminal branch marks the trade's fingerprint
//! seen exactly once, so a trade is evaluated at most once across restarts.

use anyhow::Result;
use chrono::{DateTime, Utc};
use polymarket_core::api::{PositionSource, TradeWindow};
use polymarket_core::config::Config;
use polymarket_core::types::{ExecutionReport, ObservedTrade, OrderRequest, OrderSide, SideFilter};
use risk_manager::{Candidate, ClampPipeline, ClampRejection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::executor::{FailureHint, OrderExecution};
use crate::position_cache::PositionCache;
use crate::sizing::Sizer;
use crate::state::MirrorLedger;

/// Terminal state reached by one observed trade.
#[derive(Debug, Clone)]
pub enum MirrorOutcome {
    /// Fingerprint already evaluated; nothing done.
    AlreadySeen,
    /// Side excluded by the configured filter.
    Filtered,
    /// Sizing produced no positive order.
    Unsizeable,
    /// A clamp stage rejected the candidate.
    Rejected(ClampRejection),
    /// Order accepted by the venue.
    Submitted(ExecutionReport),
    /// Order rejected by the venue or not delivered.
    ExecutionFailed { reason: String, hint: FailureHint },
}

impl MirrorOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MirrorOutcome::AlreadySeen => "already_seen",
            MirrorOutcome::Filtered => "filtered",
            MirrorOutcome::Unsizeable => "unsizeable",
            MirrorOutcome::Rejected(_) => "rejected",
            MirrorOutcome::Submitted(_) => "submitted",
            MirrorOutcome::ExecutionFailed { .. } => "execution_failed",
        }
    }
}

/// Result of mirroring one trader's batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub trader: String,
    pub fetched: usize,
    pub already_seen: usize,
    pub filtered: usize,
    pub unsizeable: usize,
    pub rejected: usize,
    pub submitted: usize,
    pub failed: usize,
    /// The window was cut short by the page cap.
    pub truncated: bool,
    /// Trader cursor after the batch.
    pub cursor: Option<i64>,
}

impl BatchSummary {
    fn count(&mut self, outcome: &MirrorOutcome) {
        match outcome {
            MirrorOutcome::AlreadySeen => self.already_seen += 1,
            MirrorOutcome::Filtered => self.filtered += 1,
            MirrorOutcome::Unsizeable => self.unsizeable += 1,
            MirrorOutcome::Rejected(_) => self.rejected += 1,
            MirrorOutcome::Submitted(_) => self.submitted += 1,
            MirrorOutcome::ExecutionFailed { .. } => self.failed += 1,
        }
    }
}

/// Cumulative mirroring statistics since startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorStats {
    /// Trades evaluated (excludes already-seen replays).
    pub observed: u64,
    pub mirrored: u64,
    /// Filtered or unsizeable.
    pub skipped: u64,
    pub rejected: u64,
    pub failed: u64,
    pub notional_mirrored: Decimal,
}

/// Mirrors tracked traders' trades onto the operator account.
pub struct CopyTrader {
    account: String,
    side_filter: SideFilter,
    sizer: Sizer,
    clamp: ClampPipeline,
    executor: Arc<dyn OrderExecution>,
    positions: Arc<dyn PositionSource>,
    position_cache: PositionCache,
    ledger: MirrorLedger,
    stats: MirrorStats,
}

impl CopyTrader {
    pub fn new(
        config: &Config,
        executor: Arc<dyn OrderExecution>,
        positions: Arc<dyn PositionSource>,
        ledger: MirrorLedger,
    ) -> Self {
        info!(
            strategy = %config.mirror.strategy,
            side_filter = ?config.mirror.side_filter,
            traders = config.mirror.traders.len(),
            "Copy trader initialized"
        );
        for trader in &config.mirror.traders {
            debug!(trader = %trader, ratio = ?config.mirror.ratio_for(trader), "Tracking trader");
        }
        Self {
            account: config.mirror.account.clone(),
            side_filter: config.mirror.side_filter,
            sizer: Sizer::from_config(&config.mirror),
            clamp: ClampPipeline::new(config.risk.clone()),
            executor,
            positions,
            position_cache: PositionCache::new(config.mirror.position_cache_ttl_secs),
            ledger,
            stats: MirrorStats::default(),
        }
    }

    pub fn ledger(&self) -> &MirrorLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut MirrorLedger {
        &mut self.ledger
    }

    pub fn stats(&self) -> &MirrorStats {
        &self.stats
    }

    /// Evaluate one trade to a terminal state.
    ///
    /// `Err` means the position lookup failed; the trade is left unseen so the
    /// next poll retries it.
    pub async fn process_trade(
        &mut self,
        trade: &ObservedTrade,
        now: DateTime<Utc>,
    ) -> Result<MirrorOutcome> {
        let fingerprint = trade.fingerprint();
        if self.ledger.is_seen(&fingerprint) {
            debug!(fingerprint = %fingerprint, "Trade already seen, skipping");
            return Ok(MirrorOutcome::AlreadySeen);
        }

        let outcome = self.evaluate(trade, now).await?;
        self.ledger.note_seen(&fingerprint, trade.timestamp);
        self.record_stats(&outcome);
        Ok(outcome)
    }

    /// Mirror a trader's window oldest first, then advance that trader's cursor.
    ///
    /// A complete window moves the cursor to its newest trade. A truncated one
    /// stops a second short of it, so trades sharing that second beyond the
    /// cut are fetched again on the next poll and the seen set skips the rest.
    pub async fn mirror_batch(
        &mut self,
        trader: &str,
        window: &TradeWindow,
        now: DateTime<Utc>,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary {
            trader: trader.to_lowercase(),
            fetched: window.trades.len(),
            truncated: !window.complete,
            ..Default::default()
        };

        for trade in &window.trades {
            let outcome = self.process_trade(trade, now).await?;
            summary.count(&outcome);
        }

        if let Some(newest) = window.newest() {
            let cursor = if window.complete {
                newest
            } else if newest > window.start {
                newest - 1
            } else {
                warn!(
                    trader = %summary.trader,
                    timestamp = newest,
                    "Page cap reached within a single second, skipping past it"
                );
                newest
            };
            self.ledger.advance_cursor(trader, cursor);
        }
        summary.cursor = self.ledger.cursor(trader);

        if summary.fetched > 0 {
            info!(
                trader = %summary.trader,
                fetched = summary.fetched,
                submitted = summary.submitted,
                rejected = summary.rejected,
                failed = summary.failed,
                truncated = summary.truncated,
                cursor = ?summary.cursor,
                "Mirrored trader batch"
            );
        }
        Ok(summary)
    }

    /// Drop seen fingerprints older than `retention_secs`.
    pub fn prune_seen(&mut self, now: DateTime<Utc>, retention_secs: i64) -> usize {
        self.ledger.prune_seen(now, retention_secs)
    }

    async fn evaluate(&mut self, trade: &ObservedTrade, now: DateTime<Utc>) -> Result<MirrorOutcome> {
        if !self.side_filter.allows(trade.side) {
            debug!(tx = %trade.tx_hash, side = %trade.side, "Side filtered out");
            return Ok(MirrorOutcome::Filtered);
        }

        let Some(candidate) = self.sizer.size(trade) else {
            debug!(
                tx = %trade.tx_hash,
                price = %trade.price,
                size = %trade.size,
                "Trade not sizeable"
            );
            return Ok(MirrorOutcome::Unsizeable);
        };

        let candidate = match self.apply_limits(trade, candidate, now).await? {
            Ok(candidate) => candidate,
            Err(rejection) => {
                info!(
                    trader = %trade.trader,
                    tx = %trade.tx_hash,
                    side = %trade.side,
                    stage = %rejection.stage(),
                    reason = %rejection,
                    "Mirror rejected by risk limits"
                );
                return Ok(MirrorOutcome::Rejected(rejection));
            }
        };

        Ok(self.submit(trade, candidate, now).await)
    }

    /// Run the clamp stages. The outer `Result` carries lookup failures, the
    /// inner one the clamp decision.
    async fn apply_limits(
        &mut self,
        trade: &ObservedTrade,
        candidate: Candidate,
        now: DateTime<Utc>,
    ) -> Result<std::result::Result<Candidate, ClampRejection>> {
        let candidate = match self.clamp.trade_bounds(candidate) {
            Ok(c) => c,
            Err(rejection) => return Ok(Err(rejection)),
        };
        let candidate = match self
            .clamp
            .daily_volume(candidate, &mut self.ledger.daily_volume, now)
        {
            Ok(c) => c,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let held = self
            .position_cache
            .position(self.positions.as_ref(), &self.account, &trade.asset_id, now)
            .await?;
        Ok(self.clamp.position_exposure(candidate, held.as_ref()))
    }

    async fn submit(
        &mut self,
        trade: &ObservedTrade,
        candidate: Candidate,
        now: DateTime<Utc>,
    ) -> MirrorOutcome {
        let order = OrderRequest::new(
            trade.condition_id.clone(),
            trade.asset_id.clone(),
            candidate.side,
            candidate.price,
            candidate.size,
        );

        let reason = match self.executor.submit_order(order).await {
            Ok(report) if report.is_success() => {
                if candidate.side == OrderSide::Buy {
                    self.ledger.daily_volume.record(now, candidate.notional);
                }
                info!(
                    trader = %trade.trader,
                    tx = %trade.tx_hash,
                    side = %candidate.side,
                    price = %candidate.price,
                    size = %candidate.size,
                    notional = %candidate.notional,
                    "Mirrored trade"
                );
                return MirrorOutcome::Submitted(report);
            }
            Ok(report) => report
                .error_message
                .unwrap_or_else(|| "order rejected".to_string()),
            Err(e) => e.to_string(),
        };

        let hint = FailureHint::classify(&reason);
        warn!(
            trader = %trade.trader,
            tx = %trade.tx_hash,
            side = %candidate.side,
            notional = %candidate.notional,
            reason = %reason,
            hint = %hint,
            "Mirror order failed"
        );
        MirrorOutcome::ExecutionFailed { reason, hint }
    }

    fn record_stats(&mut self, outcome: &MirrorOutcome) {
        match outcome {
            MirrorOutcome::AlreadySeen => return,
            MirrorOutcome::Filtered | MirrorOutcome::Unsizeable => self.stats.skipped += 1,
            MirrorOutcome::Rejected(_) => self.stats.rejected += 1,
            MirrorOutcome::Submitted(report) => {
                self.stats.mirrored += 1;
                self.stats.notional_mirrored += report.total_value();
            }
            MirrorOutcome::ExecutionFailed { .. } => self.stats.failed += 1,
        }
        self.stats.observed += 1;
    }
}
