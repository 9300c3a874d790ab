//! Redemption of resolved positions.
//!
//! Redeemable positions are grouped per market and routing class; each group
//! becomes one settlement instruction. An attempt starts the market's cooldown
//! whether or not the relay succeeds.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polymarket_core::api::PositionSource;
use polymarket_core::config::RedeemConfig;
use polymarket_core::types::Position;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::RedeemLedger;

/// Collateral base units per share (6 decimals).
pub const BASE_UNITS_PER_SHARE: u64 = 1_000_000;

/// One settlement for one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementInstruction {
    /// Redeem every outcome of a standard market.
    Standard { condition_id: String },
    /// Redeem a negative-risk market with explicit per-outcome amounts
    /// (`[outcome 0, outcome 1]`, base units).
    NegRisk {
        condition_id: String,
        amounts: [u64; 2],
    },
}

impl SettlementInstruction {
    pub fn condition_id(&self) -> &str {
        match self {
            SettlementInstruction::Standard { condition_id }
            | SettlementInstruction::NegRisk { condition_id, .. } => condition_id,
        }
    }

    pub fn is_neg_risk(&self) -> bool {
        matches!(self, SettlementInstruction::NegRisk { .. })
    }
}

/// Submits settlement instructions on chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettlementRelay: Send + Sync {
    /// Returns the transaction id.
    async fn submit_settlement(&self, instruction: SettlementInstruction) -> Result<String>;
}

/// Relay that only logs and records instructions.
#[derive(Default)]
pub struct DryRunRelay {
    submitted: Mutex<Vec<SettlementInstruction>>,
}

impl DryRunRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<SettlementInstruction> {
        self.submitted
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SettlementRelay for DryRunRelay {
    async fn submit_settlement(&self, instruction: SettlementInstruction) -> Result<String> {
        info!(
            condition_id = %instruction.condition_id(),
            neg_risk = instruction.is_neg_risk(),
            "[DRY RUN] Settlement instruction"
        );
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(instruction);
        }
        Ok(format!("dry-run-{}", Uuid::new_v4().simple()))
    }
}

/// Shares to integer base units, truncating below one unit.
pub fn to_base_units(size: Decimal) -> u64 {
    if size <= Decimal::ZERO {
        return 0;
    }
    size.checked_mul(Decimal::from(BASE_UNITS_PER_SHARE))
        .and_then(|units| units.trunc().to_u64())
        .unwrap_or(0)
}

/// Build one instruction per (condition id, routing class).
///
/// Standard and negative-risk positions of the same market never share an
/// instruction. Output is ordered by condition id.
pub fn batch_positions(positions: &[Position]) -> Vec<SettlementInstruction> {
    let mut groups: BTreeMap<(&str, bool), Vec<&Position>> = BTreeMap::new();
    for position in positions {
        groups
            .entry((position.condition_id.as_str(), position.negative_risk))
            .or_default()
            .push(position);
    }

    groups
        .into_iter()
        .map(|((condition_id, neg_risk), group)| {
            let condition_id = condition_id.to_string();
            if !neg_risk {
                return SettlementInstruction::Standard { condition_id };
            }
            let mut amounts = [0u64; 2];
            for position in group {
                match amounts.get_mut(position.outcome_index as usize) {
                    Some(slot) => *slot = slot.saturating_add(to_base_units(position.size)),
                    None => warn!(
                        condition_id = %condition_id,
                        outcome_index = position.outcome_index,
                        "Ignoring unexpected outcome index in negative-risk market"
                    ),
                }
            }
            SettlementInstruction::NegRisk {
                condition_id,
                amounts,
            }
        })
        .collect()
}

/// Result of one redemption sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Redeemable positions reported by the venue.
    pub fetched: usize,
    /// Markets skipped because of a recent attempt.
    pub on_cooldown: usize,
    pub submitted: usize,
    pub failed: usize,
    pub tx_ids: Vec<String>,
}

/// Sweeps the operator's resolved positions into settlement instructions.
pub struct RedemptionBatcher {
    account: String,
    cooldown_secs: i64,
    positions: Arc<dyn PositionSource>,
    relay: Arc<dyn SettlementRelay>,
    ledger: RedeemLedger,
}

impl RedemptionBatcher {
    pub fn new(
        account: impl Into<String>,
        config: &RedeemConfig,
        positions: Arc<dyn PositionSource>,
        relay: Arc<dyn SettlementRelay>,
        ledger: RedeemLedger,
    ) -> Self {
        Self {
            account: account.into(),
            cooldown_secs: config.cooldown_secs,
            positions,
            relay,
            ledger,
        }
    }

    pub fn ledger(&self) -> &RedeemLedger {
        &self.ledger
    }

    /// Redeemable, non-empty positions whose market is off cooldown, plus the
    /// number of distinct markets held back by cooldown.
    pub fn eligible(&self, positions: Vec<Position>, now: DateTime<Utc>) -> (Vec<Position>, usize) {
        let mut cooling: Vec<String> = Vec::new();
        let eligible = positions
            .into_iter()
            .filter(|p| p.redeemable && !p.is_empty())
            .filter(|p| {
                if self
                    .ledger
                    .on_cooldown(&p.condition_id, now, self.cooldown_secs)
                {
                    if !cooling.contains(&p.condition_id) {
                        cooling.push(p.condition_id.clone());
                    }
                    return false;
                }
                true
            })
            .collect();
        (eligible, cooling.len())
    }

    /// Fetch, filter, batch and submit. A fetch failure aborts the sweep; a
    /// relay failure only affects its own group.
    pub async fn sweep(&mut self, now: DateTime<Utc>) -> Result<SweepReport> {
        let positions = self.positions.fetch_positions(&self.account, true).await?;
        let mut report = SweepReport {
            fetched: positions.len(),
            ..Default::default()
        };

        let (eligible, on_cooldown) = self.eligible(positions, now);
        report.on_cooldown = on_cooldown;
        if eligible.is_empty() {
            debug!(fetched = report.fetched, on_cooldown, "Nothing to redeem");
            return Ok(report);
        }

        for instruction in batch_positions(&eligible) {
            let condition_id = instruction.condition_id().to_string();
            let neg_risk = instruction.is_neg_risk();
            let result = self.relay.submit_settlement(instruction).await;
            self.ledger.record_attempt(&condition_id, now);

            match result {
                Ok(tx_id) => {
                    info!(condition_id = %condition_id, neg_risk, tx = %tx_id, "Redemption submitted");
                    report.submitted += 1;
                    report.tx_ids.push(tx_id);
                }
                Err(e) => {
                    warn!(condition_id = %condition_id, neg_risk, error = %e, "Redemption failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
