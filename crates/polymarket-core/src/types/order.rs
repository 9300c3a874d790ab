//! Order types for trade execution.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Side of the order (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    #[serde(alias = "BUY")]
    Buy,
    #[serde(alias = "SELL")]
    Sell,
}

impl OrderSide {
    /// Venue spelling of the side.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            other => Err(format!("unknown order side: {other}")),
        }
    }
}

/// Which sides of observed trades are eligible for mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideFilter {
    Buy,
    Sell,
    #[default]
    Both,
}

impl SideFilter {
    pub fn allows(&self, side: OrderSide) -> bool {
        match self {
            SideFilter::Both => true,
            SideFilter::Buy => side == OrderSide::Buy,
            SideFilter::Sell => side == OrderSide::Sell,
        }
    }
}

impl FromStr for SideFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(SideFilter::Buy),
            "sell" => Ok(SideFilter::Sell),
            "both" | "" => Ok(SideFilter::Both),
            other => Err(format!("unknown side filter: {other}")),
        }
    }
}

/// Current status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order submitted to exchange.
    Pending,
    /// Order partially filled.
    PartiallyFilled,
    /// Order fully filled.
    Filled,
    /// Order rejected by exchange.
    Rejected,
}

/// A sized, risk-clamped order ready for submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub id: Uuid,
    /// Market condition id the token belongs to.
    pub market_id: String,
    /// Outcome token to trade.
    pub token_id: String,
    pub side: OrderSide,
    /// Limit price per share.
    pub price: Decimal,
    /// Number of shares.
    pub size: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderRequest {
    pub fn new(
        market_id: String,
        token_id: String,
        side: OrderSide,
        price: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            market_id,
            token_id,
            side,
            price,
            size,
            created_at: Utc::now(),
        }
    }

    /// USD value of the order.
    pub fn notional(&self) -> Decimal {
        self.size * self.price
    }
}

/// Report of an executed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub order_id: Uuid,
    pub exchange_order_id: Option<String>,
    pub market_id: String,
    pub token_id: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub requested_size: Decimal,
    pub filled_size: Decimal,
    pub average_price: Decimal,
    pub executed_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl ExecutionReport {
    pub fn success(order: &OrderRequest, filled_size: Decimal, average_price: Decimal) -> Self {
        Self {
            order_id: order.id,
            exchange_order_id: None,
            market_id: order.market_id.clone(),
            token_id: order.token_id.clone(),
            side: order.side,
            status: OrderStatus::Filled,
            requested_size: order.size,
            filled_size,
            average_price,
            executed_at: Utc::now(),
            error_message: None,
        }
    }

    pub fn rejected(order: &OrderRequest, error: impl Into<String>) -> Self {
        Self {
            order_id: order.id,
            exchange_order_id: None,
            market_id: order.market_id.clone(),
            token_id: order.token_id.clone(),
            side: order.side,
            status: OrderStatus::Rejected,
            requested_size: order.size,
            filled_size: Decimal::ZERO,
            average_price: Decimal::ZERO,
            executed_at: Utc::now(),
            error_message: Some(error.into()),
        }
    }

    pub fn with_exchange_id(mut self, id: String) -> Self {
        self.exchange_order_id = Some(id);
        self
    }

    pub fn total_value(&self) -> Decimal {
        self.filled_size * self.average_price
    }

    pub fn is_success(&self) -> bool {
        self.status == OrderStatus::Filled || self.status == OrderStatus::PartiallyFilled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parsing() {
        assert_eq!("buy".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!(" SELL ".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!("hold".parse::<OrderSide>().is_err());
    }

    #[test]
    fn test_side_filter() {
        assert!(SideFilter::Both.allows(OrderSide::Buy));
        assert!(SideFilter::Both.allows(OrderSide::Sell));
        assert!(SideFilter::Buy.allows(OrderSide::Buy));
        assert!(!SideFilter::Buy.allows(OrderSide::Sell));
        assert!(!SideFilter::Sell.allows(OrderSide::Buy));
        assert_eq!("".parse::<SideFilter>().unwrap(), SideFilter::Both);
    }

    #[test]
    fn test_execution_report_value() {
        let order = OrderRequest::new(
            "cond".to_string(),
            "token".to_string(),
            OrderSide::Buy,
            Decimal::new(40, 2),
            Decimal::new(25, 0),
        );
        assert_eq!(order.notional(), Decimal::new(10, 0));

        let report = ExecutionReport::success(&order, order.size, order.price);
        assert!(report.is_success());
        assert_eq!(report.total_value(), Decimal::new(10, 0));

        let rejected = ExecutionReport::rejected(&order, "not enough balance");
        assert!(!rejected.is_success());
        assert_eq!(rejected.error_message.as_deref(), Some("not enough balance"));
    }
}
