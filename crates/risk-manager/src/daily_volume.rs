//! Rolling per-UTC-day spend counter.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Cumulative BUY notional spent on the current UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyVolumeCounter {
    /// UTC calendar day the spend belongs to.
    day: NaiveDate,
    /// USD spent on `day`.
    spent_usd: Decimal,
}

impl Default for DailyVolumeCounter {
    fn default() -> Self {
        Self {
            day: DateTime::<Utc>::UNIX_EPOCH.date_naive(),
            spent_usd: Decimal::ZERO,
        }
    }
}

impl DailyVolumeCounter {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            day: now.date_naive(),
            spent_usd: Decimal::ZERO,
        }
    }

    /// Move the counter to `now`'s day, zeroing it if the day changed.
    /// Returns true when a reset happened.
    pub fn roll(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today == self.day {
            return false;
        }
        info!(
            previous_day = %self.day,
            previous_spent = %self.spent_usd,
            day = %today,
            "Daily volume counter reset"
        );
        self.day = today;
        self.spent_usd = Decimal::ZERO;
        true
    }

    /// Spend so far today.
    pub fn spent(&mut self, now: DateTime<Utc>) -> Decimal {
        self.roll(now);
        self.spent_usd
    }

    /// Budget left under `cap` today (may be negative if the cap was lowered).
    pub fn remaining(&mut self, now: DateTime<Utc>, cap: Decimal) -> Decimal {
        cap - self.spent(now)
    }

    /// Attribute `amount` to today. Non-positive amounts are ignored.
    pub fn record(&mut self, now: DateTime<Utc>, amount: Decimal) {
        self.roll(now);
        if amount > Decimal::ZERO {
            self.spent_usd += amount;
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }
}
