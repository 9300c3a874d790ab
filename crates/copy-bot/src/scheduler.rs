//! The mirror and redeem poll loops.
//!
//! Each loop runs for the process lifetime. An iteration error is logged and
//! the loop carries on after its sleep.

use anyhow::Result;
use chrono::{DateTime, Utc};
use polymarket_core::api::{fetch_trade_window, TradeSource};
use polymarket_core::config::{Config, RedeemConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use trading_engine::{BatchSummary, CopyTrader, RedemptionBatcher, StateHandle, SweepReport};

/// Polls every tracked trader and feeds their trades to the mirror engine.
pub struct MirrorLoop {
    traders: Vec<String>,
    lookback_secs: i64,
    retention_secs: i64,
    max_pages: u32,
    interval: Duration,
    source: Arc<dyn TradeSource>,
    copier: CopyTrader,
    state: Arc<StateHandle>,
}

impl MirrorLoop {
    pub fn new(
        config: &Config,
        source: Arc<dyn TradeSource>,
        copier: CopyTrader,
        state: Arc<StateHandle>,
    ) -> Self {
        Self {
            traders: config.mirror.traders.clone(),
            lookback_secs: config.mirror.lookback_secs,
            retention_secs: config.mirror.effective_retention_secs(),
            max_pages: config.data_api.max_pages,
            interval: Duration::from_secs(config.mirror.poll_interval_secs),
            source,
            copier,
            state,
        }
    }

    pub fn copier(&self) -> &CopyTrader {
        &self.copier
    }

    /// One pass over all traders, then prune and persist.
    ///
    /// A failing trader is skipped with its cursor unchanged; only a
    /// persistence failure fails the iteration.
    pub async fn run_once(&mut self, now: DateTime<Utc>) -> Result<Vec<BatchSummary>> {
        let end = now.timestamp();
        let mut summaries = Vec::with_capacity(self.traders.len());

        for trader in &self.traders {
            let start = self
                .copier
                .ledger()
                .start_time(trader, now, self.lookback_secs);
            if start > end {
                continue;
            }

            let window = match fetch_trade_window(
                self.source.as_ref(),
                trader,
                start,
                end,
                self.max_pages,
            )
            .await
            {
                Ok(window) => window,
                Err(e) => {
                    warn!(trader = %trader, error = %e, "Failed to fetch trades, retrying next poll");
                    continue;
                }
            };

            match self.copier.mirror_batch(trader, &window, now).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    warn!(trader = %trader, error = %e, "Failed to mirror batch, retrying next poll")
                }
            }
        }

        self.copier.prune_seen(now, self.retention_secs);
        self.state.commit_mirror(self.copier.ledger()).await?;

        let stats = self.copier.stats();
        debug!(
            observed = stats.observed,
            mirrored = stats.mirrored,
            rejected = stats.rejected,
            failed = stats.failed,
            "Mirror iteration complete"
        );
        Ok(summaries)
    }

    pub async fn run(mut self) {
        info!(
            traders = self.traders.len(),
            interval_secs = self.interval.as_secs(),
            "Mirror loop started"
        );
        loop {
            match self.run_once(Utc::now()).await {
                Ok(_) => crate::touch_health_file(),
                Err(e) => error!(error = %e, "Mirror iteration failed"),
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Periodically sweeps redeemable positions.
pub struct RedeemLoop {
    interval: Duration,
    batcher: RedemptionBatcher,
    state: Arc<StateHandle>,
}

impl RedeemLoop {
    pub fn new(config: &RedeemConfig, batcher: RedemptionBatcher, state: Arc<StateHandle>) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            batcher,
            state,
        }
    }

    pub async fn run_once(&mut self, now: DateTime<Utc>) -> Result<SweepReport> {
        let report = self.batcher.sweep(now).await?;
        self.state.commit_redeem(self.batcher.ledger()).await?;

        if report.submitted > 0 || report.failed > 0 {
            info!(
                submitted = report.submitted,
                failed = report.failed,
                on_cooldown = report.on_cooldown,
                "Redemption sweep complete"
            );
        }
        Ok(report)
    }

    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Redeem loop started");
        loop {
            if let Err(e) = self.run_once(Utc::now()).await {
                error!(error = %e, "Redemption iteration failed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
