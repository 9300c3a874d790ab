//! Order sizing for mirrored trades.

use polymarket_core::config::MirrorConfig;
use polymarket_core::types::{ObservedTrade, SizingStrategy};
use risk_manager::Candidate;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Maps an observed trade to a candidate order under the configured strategy.
#[derive(Debug, Clone)]
pub struct Sizer {
    strategy: SizingStrategy,
    /// Per-trader ratio overrides, keyed by lowercased address.
    trader_ratios: HashMap<String, Decimal>,
}

impl Sizer {
    pub fn new(strategy: SizingStrategy, trader_ratios: HashMap<String, Decimal>) -> Self {
        let trader_ratios = trader_ratios
            .into_iter()
            .map(|(trader, ratio)| (trader.to_lowercase(), ratio))
            .collect();
        Self {
            strategy,
            trader_ratios,
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.strategy, config.trader_ratios.clone())
    }

    /// Trader override if present, else the strategy's global ratio.
    pub fn effective_ratio(&self, trader: &str, global: Decimal) -> Decimal {
        self.trader_ratios
            .get(&trader.to_lowercase())
            .copied()
            .unwrap_or(global)
    }

    /// Size `trade`, or `None` when no positive, representable order results.
    pub fn size(&self, trade: &ObservedTrade) -> Option<Candidate> {
        let price = trade.price;
        if price <= Decimal::ZERO {
            return None;
        }

        let candidate = match self.strategy {
            SizingStrategy::PercentUsd { ratio } => {
                let ratio = self.effective_ratio(&trade.trader, ratio);
                let notional = trade.usd_size.checked_mul(ratio)?;
                Candidate::from_notional(trade.side, price, notional)?
            }
            SizingStrategy::PercentShares { ratio } => {
                let ratio = self.effective_ratio(&trade.trader, ratio);
                let size = trade.size.checked_mul(ratio)?;
                Candidate::from_size(trade.side, price, size)?
            }
            SizingStrategy::FixedUsd { usd } => Candidate::from_notional(trade.side, price, usd)?,
            SizingStrategy::FixedShares { shares } => {
                Candidate::from_size(trade.side, price, shares)?
            }
        };

        if candidate.size <= Decimal::ZERO || candidate.notional <= Decimal::ZERO {
            return None;
        }
        Some(candidate)
    }
}
