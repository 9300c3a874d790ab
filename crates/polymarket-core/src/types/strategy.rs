//! Sizing strategy selection for mirrored orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a mirrored order is sized relative to the observed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizingStrategy {
    /// Mirror a fraction of the trade's USD notional.
    PercentUsd { ratio: Decimal },
    /// Mirror a fraction of the trade's share count.
    PercentShares { ratio: Decimal },
    /// Spend a fixed USD amount per mirrored trade.
    FixedUsd { usd: Decimal },
    /// Trade a fixed share count per mirrored trade.
    FixedShares { shares: Decimal },
}

impl SizingStrategy {
    /// Build a strategy from its configured name and amounts.
    pub fn from_parts(
        name: &str,
        ratio: Option<Decimal>,
        fixed_usd: Option<Decimal>,
        fixed_shares: Option<Decimal>,
    ) -> Result<Self, String> {
        let missing = |what: &str| format!("strategy {name} requires {what}");
        match name.trim().to_ascii_lowercase().as_str() {
            "percent_usd" => Ok(Self::PercentUsd {
                ratio: ratio.ok_or_else(|| missing("a ratio"))?,
            }),
            "percent_shares" => Ok(Self::PercentShares {
                ratio: ratio.ok_or_else(|| missing("a ratio"))?,
            }),
            "fixed_usd" => Ok(Self::FixedUsd {
                usd: fixed_usd.ok_or_else(|| missing("a fixed USD amount"))?,
            }),
            "fixed_shares" => Ok(Self::FixedShares {
                shares: fixed_shares.ok_or_else(|| missing("a fixed share amount"))?,
            }),
            other => Err(format!("unknown sizing strategy: {other}")),
        }
    }

    /// Whether per-trader ratio overrides apply to this strategy.
    pub fn is_ratio_based(&self) -> bool {
        matches!(self, Self::PercentUsd { .. } | Self::PercentShares { .. })
    }

    /// The configured amount (ratio or fixed quantity).
    pub fn amount(&self) -> Decimal {
        match *self {
            Self::PercentUsd { ratio } | Self::PercentShares { ratio } => ratio,
            Self::FixedUsd { usd } => usd,
            Self::FixedShares { shares } => shares,
        }
    }
}

impl fmt::Display for SizingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PercentUsd { ratio } => write!(f, "percent_usd({ratio})"),
            Self::PercentShares { ratio } => write!(f, "percent_shares({ratio})"),
            Self::FixedUsd { usd } => write!(f, "fixed_usd(${usd})"),
            Self::FixedShares { shares } => write!(f, "fixed_shares({shares})"),
        }
    }
}
