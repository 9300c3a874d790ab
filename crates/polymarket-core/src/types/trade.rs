//! Trades observed on tracked traders' accounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::OrderSide;

/// A trade made by a tracked trader, as reported by the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedTrade {
    /// Trader address (lowercased).
    pub trader: String,
    /// Venue transaction hash.
    pub tx_hash: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    /// Market condition id.
    pub condition_id: String,
    /// Outcome token id.
    pub asset_id: String,
    pub side: OrderSide,
    /// Price per share.
    pub price: Decimal,
    /// Number of shares.
    pub size: Decimal,
    /// USD value of the trade.
    pub usd_size: Decimal,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ObservedTrade {
    pub fn fingerprint(&self) -> TradeFingerprint {
        TradeFingerprint::of(self)
    }
}

/// Identity of a trade for exactly-once mirroring.
///
/// Several fills can share one transaction hash, so asset, side, size and
/// price are part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradeFingerprint {
    tx_hash: String,
    asset_id: String,
    side: OrderSide,
    size: Decimal,
    price: Decimal,
}

impl TradeFingerprint {
    pub fn of(trade: &ObservedTrade) -> Self {
        Self {
            tx_hash: trade.tx_hash.to_lowercase(),
            asset_id: trade.asset_id.clone(),
            side: trade.side,
            size: trade.size.normalize(),
            price: trade.price.normalize(),
        }
    }

    /// Stable string form used as the persisted key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TradeFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.tx_hash, self.asset_id, self.side, self.size, self.price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(tx: &str, size: Decimal, price: Decimal) -> ObservedTrade {
        ObservedTrade {
            trader: "0xabc".to_string(),
            tx_hash: tx.to_string(),
            timestamp: 1_700_000_000,
            condition_id: "cond".to_string(),
            asset_id: "token".to_string(),
            side: OrderSide::Buy,
            price,
            size,
            usd_size: size * price,
            outcome: None,
            title: None,
        }
    }

    #[test]
    fn test_fingerprint_ignores_decimal_scale() {
        let a = trade("0xTX", Decimal::new(100, 0), Decimal::new(40, 2));
        let b = trade("0xtx", Decimal::new(10000, 2), Decimal::new(4, 1));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().key(), "0xtx:token:BUY:100:0.4");
    }

    #[test]
    fn test_fills_in_same_tx_are_distinct() {
        let a = trade("0xtx", Decimal::new(100, 0), Decimal::new(40, 2));
        let b = trade("0xtx", Decimal::new(50, 0), Decimal::new(40, 2));
        assert_ne!(a.fingerprint().key(), b.fingerprint().key());
    }
}
