//! Polymarket Data API client.
//!
//! Reads trader activity (`/activity`) and account positions (`/positions`).
//! Requests are bounded by the configured timeout and are not retried here;
//! callers retry on their next poll.

use crate::api::{PositionSource, TradePage, TradeSource};
use crate::config::DataApiConfig;
use crate::types::{ObservedTrade, OrderSide, Position};
use crate::{Error, Result};
use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

/// HTTP client for the Polymarket Data API.
pub struct DataApiClient {
    base_url: String,
    page_limit: u32,
    max_pages: u32,
    http_client: reqwest::Client,
}

impl DataApiClient {
    /// Default Data API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://data-api.polymarket.com";

    pub fn new(config: &DataApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.request_timeout_secs))
            .connect_timeout(StdDuration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_limit: config.page_limit,
            max_pages: config.max_pages,
            http_client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                message: format!("GET {url} failed: {status}"),
                status: Some(status.as_u16()),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            let preview: String = text.chars().take(500).collect();
            warn!(error = %e, url = url, response_preview = %preview, "Could not parse Data API response");
            Error::Api {
                message: format!("Data API parse error: {}", e),
                status: None,
            }
        })
    }

    /// Offset of the page after one that returned `entries` rows.
    fn next_offset(&self, offset: u32, entries: usize) -> Option<u32> {
        (entries >= self.page_limit as usize).then(|| offset.saturating_add(self.page_limit))
    }
}

#[async_trait]
impl TradeSource for DataApiClient {
    async fn fetch_trades(
        &self,
        trader: &str,
        start: i64,
        end: i64,
        offset: u32,
    ) -> Result<TradePage> {
        let url = format!(
            "{}/activity?user={}&type=TRADE&start={}&end={}&limit={}&offset={}&sortBy=TIMESTAMP&sortDirection=ASC",
            self.base_url, trader, start, end, self.page_limit, offset
        );
        let entries: Vec<ActivityEntry> = self.get_json(&url).await?;
        let next_offset = self.next_offset(offset, entries.len());
        let trades = trades_from_activity(trader, entries, start, end);

        debug!(trader = %trader, start, end, offset, count = trades.len(), "Fetched trader activity");
        Ok(TradePage {
            trades,
            next_offset,
        })
    }
}

#[async_trait]
impl PositionSource for DataApiClient {
    async fn fetch_positions(&self, account: &str, redeemable_only: bool) -> Result<Vec<Position>> {
        let mut positions = Vec::new();
        let mut offset = 0;

        for _ in 0..self.max_pages {
            let mut url = format!(
                "{}/positions?user={}&sizeThreshold=0&limit={}&offset={}",
                self.base_url, account, self.page_limit, offset
            );
            if redeemable_only {
                url.push_str("&redeemable=true");
            }
            let entries: Vec<PositionEntry> = self.get_json(&url).await?;
            let next_offset = self.next_offset(offset, entries.len());
            positions.extend(
                entries
                    .into_iter()
                    .filter_map(PositionEntry::into_position)
                    .filter(|p| !redeemable_only || p.redeemable),
            );

            match next_offset {
                Some(next) => offset = next,
                None => {
                    debug!(account = %account, redeemable_only, count = positions.len(), "Fetched positions");
                    return Ok(positions);
                }
            }
        }

        Err(Error::Api {
            message: format!(
                "positions for {account} exceed {} pages of {}",
                self.max_pages, self.page_limit
            ),
            status: None,
        })
    }
}

/// Keep well-formed trades inside the window, sorted oldest first.
fn trades_from_activity(
    trader: &str,
    entries: Vec<ActivityEntry>,
    start: i64,
    end: i64,
) -> Vec<ObservedTrade> {
    let trader = trader.to_lowercase();
    let mut trades: Vec<ObservedTrade> = entries
        .into_iter()
        .filter_map(|e| e.into_trade(&trader))
        .filter(|t| t.timestamp >= start && t.timestamp <= end)
        .collect();
    trades.sort_by_key(|t| t.timestamp);
    trades
}

fn decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}

/// A single entry from the Data API `/activity` endpoint.
#[derive(Debug, Deserialize)]
struct ActivityEntry {
    #[serde(alias = "transactionHash", default)]
    transaction_hash: Option<String>,
    #[serde(alias = "proxyWallet", default)]
    proxy_wallet: Option<String>,
    #[serde(alias = "type", default)]
    activity_type: Option<String>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default)]
    asset: Option<String>,
    #[serde(alias = "conditionId", default)]
    condition_id: Option<String>,
    /// Shares.
    #[serde(default)]
    size: Option<f64>,
    /// USD value.
    #[serde(alias = "usdcSize", default)]
    usdc_size: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl ActivityEntry {
    /// Convert to an `ObservedTrade`, returning `None` for non-TRADE entries
    /// or entries missing identifying fields.
    fn into_trade(self, trader: &str) -> Option<ObservedTrade> {
        if let Some(kind) = &self.activity_type {
            if !kind.eq_ignore_ascii_case("TRADE") {
                return None;
            }
        }
        if let Some(wallet) = &self.proxy_wallet {
            if wallet.to_lowercase() != trader {
                warn!(expected = %trader, actual = %wallet, "Activity returned trade for wrong wallet, skipping");
                return None;
            }
        }

        let tx_hash = self.transaction_hash.filter(|s| !s.is_empty())?;
        let side = self.side.as_deref()?.parse::<OrderSide>().ok()?;
        let asset_id = self.asset.filter(|s| !s.is_empty())?;
        let timestamp = self.timestamp?;
        let price = decimal(self.price).unwrap_or(Decimal::ZERO);
        let size = decimal(self.size).unwrap_or(Decimal::ZERO);
        // Prefer the venue's USD figure; fall back to size * price.
        let usd_size = decimal(self.usdc_size).unwrap_or(size * price);

        Some(ObservedTrade {
            trader: trader.to_string(),
            tx_hash,
            timestamp,
            condition_id: self.condition_id.unwrap_or_else(|| asset_id.clone()),
            asset_id,
            side,
            price,
            size,
            usd_size,
            outcome: self.outcome,
            title: self.title,
        })
    }
}

/// A single entry from the Data API `/positions` endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionEntry {
    #[serde(default)]
    asset: Option<String>,
    #[serde(default)]
    condition_id: Option<String>,
    #[serde(default)]
    outcome_index: Option<u32>,
    #[serde(default)]
    size: Option<f64>,
    #[serde(default)]
    avg_price: Option<f64>,
    #[serde(default)]
    cur_price: Option<f64>,
    #[serde(default)]
    redeemable: bool,
    #[serde(default)]
    negative_risk: bool,
}

impl PositionEntry {
    fn into_position(self) -> Option<Position> {
        Some(Position {
            asset_id: self.asset.filter(|s| !s.is_empty())?,
            condition_id: self.condition_id.filter(|s| !s.is_empty())?,
            outcome_index: self.outcome_index.unwrap_or(0),
            size: decimal(self.size).unwrap_or(Decimal::ZERO),
            avg_price: decimal(self.avg_price).unwrap_or(Decimal::ZERO),
            cur_price: decimal(self.cur_price).unwrap_or(Decimal::ZERO),
            redeemable: self.redeemable,
            negative_risk: self.negative_risk,
        })
    }
}
