//! Order execution capability and the paper executor.

use anyhow::Result;
use async_trait::async_trait;
use polymarket_core::types::{ExecutionReport, OrderRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

/// Submits orders to the venue.
///
/// A venue rejection is returned as a report with `OrderStatus::Rejected`;
/// `Err` is reserved for transport failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderExecution: Send + Sync {
    async fn submit_order(&self, order: OrderRequest) -> Result<ExecutionReport>;
}

/// Classification of an execution failure for operator logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureHint {
    InsufficientBalance,
    Allowance,
    Other,
}

impl FailureHint {
    pub fn classify(reason: &str) -> Self {
        let reason = reason.to_ascii_lowercase();
        if reason.contains("allowance") || reason.contains("approv") {
            FailureHint::Allowance
        } else if reason.contains("balance") || reason.contains("insufficient") {
            FailureHint::InsufficientBalance
        } else {
            FailureHint::Other
        }
    }
}

impl fmt::Display for FailureHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hint = match self {
            FailureHint::InsufficientBalance => "insufficient collateral balance",
            FailureHint::Allowance => "collateral allowance not approved",
            FailureHint::Other => "unclassified",
        };
        f.write_str(hint)
    }
}

/// Metrics for order execution performance.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    pub orders_submitted: u64,
    pub orders_filled: u64,
    pub orders_rejected: u64,
    pub total_volume: Decimal,
    pub avg_latency_us: u64,
}

/// Configuration for the paper executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum order size in shares.
    pub max_order_size: Decimal,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_order_size: Decimal::new(100_000, 0),
        }
    }
}

/// Executor that fills every valid order at its limit price without touching the venue.
pub struct PaperExecutor {
    config: ExecutorConfig,
    metrics: std::sync::RwLock<ExecutionMetrics>,
}

impl PaperExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            metrics: std::sync::RwLock::new(ExecutionMetrics::default()),
        }
    }

    /// Get current execution metrics.
    pub fn metrics(&self) -> ExecutionMetrics {
        self.metrics
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    fn simulate(&self, order: &OrderRequest) -> ExecutionReport {
        if order.size <= Decimal::ZERO {
            return ExecutionReport::rejected(order, "order size must be positive");
        }
        if order.size > self.config.max_order_size {
            return ExecutionReport::rejected(
                order,
                format!(
                    "order size {} exceeds maximum {}",
                    order.size, self.config.max_order_size
                ),
            );
        }

        info!(
            order_id = %order.id,
            token = %order.token_id,
            side = %order.side,
            price = %order.price,
            size = %order.size,
            "[PAPER] Simulated order fill"
        );
        ExecutionReport::success(order, order.size, order.price)
            .with_exchange_id(format!("paper-{}", order.id.simple()))
    }

    fn record(&self, report: &ExecutionReport, latency_us: u64) {
        let Ok(mut metrics) = self.metrics.write() else {
            warn!("Execution metrics lock poisoned");
            return;
        };
        metrics.orders_submitted += 1;
        if report.is_success() {
            metrics.orders_filled += 1;
            metrics.total_volume += report.total_value();
        } else {
            metrics.orders_rejected += 1;
        }
        metrics.avg_latency_us = metrics
            .avg_latency_us
            .saturating_mul(metrics.orders_submitted - 1)
            .saturating_add(latency_us)
            / metrics.orders_submitted;
    }
}

fn elapsed_us(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

impl Default for PaperExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

#[async_trait]
impl OrderExecution for PaperExecutor {
    async fn submit_order(&self, order: OrderRequest) -> Result<ExecutionReport> {
        let start = Instant::now();
        let report = self.simulate(&order);
        self.record(&report, elapsed_us(start));
        Ok(report)
    }
}
