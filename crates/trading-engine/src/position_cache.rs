//! Short-lived cache of the operator's positions.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use polymarket_core::api::PositionSource;
use polymarket_core::types::Position;
use std::collections::HashMap;
use tracing::debug;

/// Positions keyed by asset id, refreshed as a whole once the TTL lapses.
#[derive(Debug)]
pub struct PositionCache {
    ttl: Duration,
    fetched_at: Option<DateTime<Utc>>,
    positions: HashMap<String, Position>,
}

impl PositionCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            fetched_at: None,
            positions: HashMap::new(),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.fetched_at
            .map(|at| now - at < self.ttl)
            .unwrap_or(false)
    }

    pub fn replace(&mut self, positions: Vec<Position>, now: DateTime<Utc>) {
        self.positions = positions
            .into_iter()
            .map(|p| (p.asset_id.clone(), p))
            .collect();
        self.fetched_at = Some(now);
    }

    /// Cached holding for `asset_id`, regardless of freshness.
    pub fn get(&self, asset_id: &str) -> Option<&Position> {
        self.positions.get(asset_id)
    }

    /// Holding for `asset_id`, refreshing from `source` if the cache is stale.
    pub async fn position(
        &mut self,
        source: &dyn PositionSource,
        account: &str,
        asset_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Position>> {
        if !self.is_fresh(now) {
            let positions = source.fetch_positions(account, false).await?;
            debug!(account = %account, count = positions.len(), "Refreshed position cache");
            self.replace(positions, now);
        }
        Ok(self.get(asset_id).cloned())
    }
}
