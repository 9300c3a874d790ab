//! API clients and the read-side capabilities the engine consumes.

pub mod data_api;

use crate::types::{ObservedTrade, Position};
use crate::Result;
use async_trait::async_trait;
use tracing::warn;

pub use data_api::DataApiClient;

/// One page of a trader's activity.
#[derive(Debug, Clone, Default)]
pub struct TradePage {
    /// Trades on this page, ascending by timestamp.
    pub trades: Vec<ObservedTrade>,
    /// Offset of the next page. `None` when this page came back short.
    pub next_offset: Option<u32>,
}

/// Every trade collected for one poll window.
#[derive(Debug, Clone, Default)]
pub struct TradeWindow {
    pub start: i64,
    pub end: i64,
    /// Ascending by timestamp.
    pub trades: Vec<ObservedTrade>,
    /// False when the page cap stopped collection before the last page.
    pub complete: bool,
}

impl TradeWindow {
    /// A window known to hold every trade in `[start, end]`.
    pub fn complete(start: i64, end: i64, mut trades: Vec<ObservedTrade>) -> Self {
        trades.sort_by_key(|t| t.timestamp);
        Self {
            start,
            end,
            trades,
            complete: true,
        }
    }

    pub fn newest(&self) -> Option<i64> {
        self.trades.iter().map(|t| t.timestamp).max()
    }
}

/// Source of trades made by tracked traders.
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// One page of trades by `trader` with `start <= timestamp <= end` (Unix
    /// seconds), ascending, skipping the first `offset` venue entries.
    async fn fetch_trades(
        &self,
        trader: &str,
        start: i64,
        end: i64,
        offset: u32,
    ) -> Result<TradePage>;
}

/// Source of an account's current positions.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_positions(&self, account: &str, redeemable_only: bool)
        -> Result<Vec<Position>>;
}

/// Collect a trader's window page by page until a short page or `max_pages`.
pub async fn fetch_trade_window(
    source: &dyn TradeSource,
    trader: &str,
    start: i64,
    end: i64,
    max_pages: u32,
) -> Result<TradeWindow> {
    let mut trades = Vec::new();
    let mut offset = 0;

    for _ in 0..max_pages {
        let page = source.fetch_trades(trader, start, end, offset).await?;
        trades.extend(page.trades);
        match page.next_offset {
            Some(next) if next > offset => offset = next,
            _ => return Ok(TradeWindow::complete(start, end, trades)),
        }
    }

    warn!(
        trader = %trader,
        start,
        end,
        max_pages,
        fetched = trades.len(),
        "Trade window exceeds page cap, remainder deferred to next poll"
    );
    let mut window = TradeWindow::complete(start, end, trades);
    window.complete = false;
    Ok(window)
}
