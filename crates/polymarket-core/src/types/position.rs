//! Positions held by an account, as reported by the Data API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A per-market, per-outcome holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Market condition id.
    pub condition_id: String,
    /// Outcome token id.
    pub asset_id: String,
    /// Index of the outcome within its market (0 or 1 for binary markets).
    pub outcome_index: u32,
    /// Shares held.
    pub size: Decimal,
    pub avg_price: Decimal,
    pub cur_price: Decimal,
    /// Whether the market has resolved and the position can be redeemed.
    pub redeemable: bool,
    /// Whether the market belongs to a negative-risk (combinatorial) event.
    pub negative_risk: bool,
}

impl Position {
    /// Mark-to-market value of the holding.
    pub fn current_value(&self) -> Decimal {
        self.size * self.cur_price
    }

    pub fn is_empty(&self) -> bool {
        self.size <= Decimal::ZERO
    }
}
