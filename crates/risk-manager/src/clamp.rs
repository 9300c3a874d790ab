//! Three-stage clamp pipeline for mirrored orders.
//!
//! Stages run in order: trade bounds, daily volume (BUY only), position
//! exposure. Each stage passes the candidate through, shrinks it, or rejects
//! it. A stage never increases notional, and nothing runs after a rejection.

use chrono::{DateTime, Utc};
use polymarket_core::config::RiskLimits;
use polymarket_core::types::{OrderSide, Position};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::DailyVolumeCounter;

/// A proposed order: side, price, and the (size, notional) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub notional: Decimal,
}

impl Candidate {
    /// Candidate spending `notional` USD at `price`.
    pub fn from_notional(side: OrderSide, price: Decimal, notional: Decimal) -> Option<Self> {
        let size = notional.checked_div(price)?;
        Some(Self {
            side,
            price,
            size,
            notional,
        })
    }

    /// Candidate trading `size` shares at `price`.
    pub fn from_size(side: OrderSide, price: Decimal, size: Decimal) -> Option<Self> {
        let notional = size.checked_mul(price)?;
        Some(Self {
            side,
            price,
            size,
            notional,
        })
    }

    fn shrink_to_notional(self, notional: Decimal) -> Result<Self, ClampRejection> {
        Self::from_notional(self.side, self.price, notional)
            .ok_or(ClampRejection::NonPositivePrice { price: self.price })
    }

    fn shrink_to_size(self, size: Decimal) -> Result<Self, ClampRejection> {
        Self::from_size(self.side, self.price, size)
            .ok_or(ClampRejection::NonPositivePrice { price: self.price })
    }
}

/// Pipeline stage that produced a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampStage {
    TradeBounds,
    DailyVolume,
    PositionExposure,
}

impl fmt::Display for ClampStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClampStage::TradeBounds => "trade bounds",
            ClampStage::DailyVolume => "daily volume",
            ClampStage::PositionExposure => "position exposure",
        };
        f.write_str(name)
    }
}

/// Why a candidate produced no order.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampRejection {
    #[error("price {price} is not positive")]
    NonPositivePrice { price: Decimal },

    #[error("notional ${notional} below minimum ${min} after {stage}")]
    BelowMinimum {
        stage: ClampStage,
        notional: Decimal,
        min: Decimal,
    },

    #[error("daily cap ${cap} exhausted (spent ${spent})")]
    DailyCapReached { spent: Decimal, cap: Decimal },

    #[error("position cap ${cap} exhausted (current value ${current})")]
    PositionCapReached { current: Decimal, cap: Decimal },

    #[error("no position held to sell")]
    NothingToSell,
}

impl ClampRejection {
    pub fn stage(&self) -> ClampStage {
        match self {
            ClampRejection::NonPositivePrice { .. } => ClampStage::TradeBounds,
            ClampRejection::BelowMinimum { stage, .. } => *stage,
            ClampRejection::DailyCapReached { .. } => ClampStage::DailyVolume,
            ClampRejection::PositionCapReached { .. } | ClampRejection::NothingToSell => {
                ClampStage::PositionExposure
            }
        }
    }
}

/// Applies the configured risk limits to candidates.
#[derive(Debug, Clone)]
pub struct ClampPipeline {
    limits: RiskLimits,
}

impl ClampPipeline {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Run all three stages.
    pub fn run(
        &self,
        candidate: Candidate,
        daily: &mut DailyVolumeCounter,
        now: DateTime<Utc>,
        held: Option<&Position>,
    ) -> Result<Candidate, ClampRejection> {
        let candidate = self.trade_bounds(candidate)?;
        let candidate = self.daily_volume(candidate, daily, now)?;
        self.position_exposure(candidate, held)
    }

    /// Stage 1: reject below the minimum, shrink above the maximum.
    pub fn trade_bounds(&self, candidate: Candidate) -> Result<Candidate, ClampRejection> {
        if candidate.price <= Decimal::ZERO {
            return Err(ClampRejection::NonPositivePrice {
                price: candidate.price,
            });
        }
        if candidate.notional < self.limits.min_trade_usd {
            return Err(ClampRejection::BelowMinimum {
                stage: ClampStage::TradeBounds,
                notional: candidate.notional,
                min: self.limits.min_trade_usd,
            });
        }
        if candidate.notional > self.limits.max_trade_usd {
            debug!(
                notional = %candidate.notional,
                max = %self.limits.max_trade_usd,
                "Shrinking candidate to maximum trade size"
            );
            return candidate.shrink_to_notional(self.limits.max_trade_usd);
        }
        Ok(candidate)
    }

    /// Stage 2: keep BUY spend under the daily cap. SELL passes through.
    pub fn daily_volume(
        &self,
        candidate: Candidate,
        daily: &mut DailyVolumeCounter,
        now: DateTime<Utc>,
    ) -> Result<Candidate, ClampRejection> {
        if candidate.side == OrderSide::Sell {
            return Ok(candidate);
        }

        let spent = daily.spent(now);
        let remaining = daily.remaining(now, self.limits.daily_cap_usd);
        if remaining <= Decimal::ZERO {
            return Err(ClampRejection::DailyCapReached {
                spent,
                cap: self.limits.daily_cap_usd,
            });
        }
        if candidate.notional <= remaining {
            return Ok(candidate);
        }

        debug!(
            notional = %candidate.notional,
            remaining = %remaining,
            "Shrinking candidate to remaining daily budget"
        );
        let shrunk = candidate.shrink_to_notional(remaining)?;
        self.recheck_minimum(shrunk, ClampStage::DailyVolume)
    }

    /// Stage 3: cap BUY exposure per position; never SELL more than is held.
    pub fn position_exposure(
        &self,
        candidate: Candidate,
        held: Option<&Position>,
    ) -> Result<Candidate, ClampRejection> {
        match candidate.side {
            OrderSide::Buy => {
                let current = held.map(Position::current_value).unwrap_or(Decimal::ZERO);
                let remaining = self.limits.position_cap_usd - current;
                if remaining <= Decimal::ZERO {
                    return Err(ClampRejection::PositionCapReached {
                        current,
                        cap: self.limits.position_cap_usd,
                    });
                }
                if candidate.notional <= remaining {
                    return Ok(candidate);
                }
                debug!(
                    notional = %candidate.notional,
                    remaining = %remaining,
                    "Shrinking candidate to remaining position budget"
                );
                let shrunk = candidate.shrink_to_notional(remaining)?;
                self.recheck_minimum(shrunk, ClampStage::PositionExposure)
            }
            OrderSide::Sell => {
                let held_size = match held {
                    Some(position) if !position.is_empty() => position.size,
                    _ => return Err(ClampRejection::NothingToSell),
                };
                if candidate.size <= held_size {
                    return Ok(candidate);
                }
                debug!(
                    size = %candidate.size,
                    held = %held_size,
                    "Clamping sell to held size"
                );
                let shrunk = candidate.shrink_to_size(held_size)?;
                self.recheck_minimum(shrunk, ClampStage::PositionExposure)
            }
        }
    }

    fn recheck_minimum(
        &self,
        candidate: Candidate,
        stage: ClampStage,
    ) -> Result<Candidate, ClampRejection> {
        if candidate.notional < self.limits.min_trade_usd {
            return Err(ClampRejection::BelowMinimum {
                stage,
                notional: candidate.notional,
                min: self.limits.min_trade_usd,
            });
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn limits() -> RiskLimits {
        RiskLimits {
            min_trade_usd: Decimal::new(10, 0),
            max_trade_usd: Decimal::new(100, 0),
            daily_cap_usd: Decimal::new(30, 0),
            position_cap_usd: Decimal::new(60, 0),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn buy(notional: i64) -> Candidate {
        Candidate::from_notional(OrderSide::Buy, Decimal::new(50, 2), Decimal::new(notional, 0))
            .unwrap()
    }

    fn held(size: i64, cur_price: Decimal) -> Position {
        Position {
            condition_id: "cond".to_string(),
            asset_id: "token".to_string(),
            outcome_index: 0,
            size: Decimal::new(size, 0),
            avg_price: Decimal::new(50, 2),
            cur_price,
            redeemable: false,
            negative_risk: false,
        }
    }

    #[test]
    fn test_trade_bounds() {
        let pipeline = ClampPipeline::new(limits());

        let rejected = pipeline.trade_bounds(buy(5)).unwrap_err();
        assert_eq!(rejected.stage(), ClampStage::TradeBounds);

        let shrunk = pipeline.trade_bounds(buy(250)).unwrap();
        assert_eq!(shrunk.notional, Decimal::new(100, 0));
        assert_eq!(shrunk.size, Decimal::new(200, 0));

        let unchanged = pipeline.trade_bounds(buy(40)).unwrap();
        assert_eq!(unchanged, buy(40));
    }

    #[test]
    fn test_daily_volume_shrinks_then_rechecks_minimum() {
        let mut limits = limits();
        limits.min_trade_usd = Decimal::ONE;
        let pipeline = ClampPipeline::new(limits);
        let mut daily = DailyVolumeCounter::new(now());
        daily.record(now(), Decimal::new(25, 0));

        let shrunk = pipeline.daily_volume(buy(50), &mut daily, now()).unwrap();
        assert_eq!(shrunk.notional, Decimal::new(5, 0));
        assert_eq!(shrunk.size, Decimal::new(10, 0));

        let strict = ClampPipeline::new(self::limits());
        let rejected = strict.daily_volume(buy(50), &mut daily, now()).unwrap_err();
        assert_eq!(
            rejected,
            ClampRejection::BelowMinimum {
                stage: ClampStage::DailyVolume,
                notional: Decimal::new(5, 0),
                min: Decimal::new(10, 0),
            }
        );
    }

    #[test]
    fn test_daily_volume_exhausted_and_sell_passthrough() {
        let pipeline = ClampPipeline::new(limits());
        let mut daily = DailyVolumeCounter::new(now());
        daily.record(now(), Decimal::new(30, 0));

        assert!(matches!(
            pipeline.daily_volume(buy(20), &mut daily, now()),
            Err(ClampRejection::DailyCapReached { .. })
        ));

        let sell = Candidate::from_size(OrderSide::Sell, Decimal::new(50, 2), Decimal::new(100, 0))
            .unwrap();
        assert_eq!(pipeline.daily_volume(sell, &mut daily, now()).unwrap(), sell);
    }

    #[test]
    fn test_daily_volume_rolls_stale_day_before_reading() {
        let pipeline = ClampPipeline::new(limits());
        let yesterday = now() - chrono::Duration::days(1);
        let mut daily = DailyVolumeCounter::new(yesterday);
        daily.record(yesterday, Decimal::new(30, 0));

        let passed = pipeline.daily_volume(buy(20), &mut daily, now()).unwrap();
        assert_eq!(passed.notional, Decimal::new(20, 0));
        assert_eq!(daily.day(), now().date_naive());
    }

    #[test]
    fn test_position_exposure_buy() {
        let pipeline = ClampPipeline::new(limits());

        let fresh = pipeline.position_exposure(buy(40), None).unwrap();
        assert_eq!(fresh.notional, Decimal::new(40, 0));

        // 80 shares at 0.50 = $40 held, $20 left under the $60 cap.
        let position = held(80, Decimal::new(50, 2));
        let shrunk = pipeline.position_exposure(buy(40), Some(&position)).unwrap();
        assert_eq!(shrunk.notional, Decimal::new(20, 0));

        let full = held(120, Decimal::new(50, 2));
        assert!(matches!(
            pipeline.position_exposure(buy(40), Some(&full)),
            Err(ClampRejection::PositionCapReached { .. })
        ));

        // $55 held leaves $5, below the $10 minimum.
        let nearly_full = held(110, Decimal::new(50, 2));
        assert!(matches!(
            pipeline.position_exposure(buy(40), Some(&nearly_full)),
            Err(ClampRejection::BelowMinimum {
                stage: ClampStage::PositionExposure,
                ..
            })
        ));
    }

    #[test]
    fn test_position_exposure_sell_clamps_to_held() {
        let pipeline = ClampPipeline::new(limits());
        let price = Decimal::new(40, 2);
        let sell = Candidate::from_size(OrderSide::Sell, price, Decimal::new(80, 0)).unwrap();

        let position = held(50, Decimal::new(45, 2));
        let clamped = pipeline.position_exposure(sell, Some(&position)).unwrap();
        assert_eq!(clamped.size, Decimal::new(50, 0));
        assert_eq!(clamped.notional, Decimal::new(20, 0));

        assert_eq!(
            pipeline.position_exposure(sell, None),
            Err(ClampRejection::NothingToSell)
        );
        let empty = held(0, price);
        assert_eq!(
            pipeline.position_exposure(sell, Some(&empty)),
            Err(ClampRejection::NothingToSell)
        );
    }

    #[test]
    fn test_stages_never_increase_notional() {
        let pipeline = ClampPipeline::new(RiskLimits {
            min_trade_usd: Decimal::ONE,
            ..limits()
        });
        let position = held(60, Decimal::new(50, 2));

        for notional in [1, 5, 10, 29, 30, 31, 60, 99, 100, 101, 500] {
            let mut daily = DailyVolumeCounter::new(now());
            daily.record(now(), Decimal::new(7, 0));
            let input = buy(notional);

            let Ok(s1) = pipeline.trade_bounds(input) else {
                continue;
            };
            assert!(s1.notional <= input.notional);
            let Ok(s2) = pipeline.daily_volume(s1, &mut daily, now()) else {
                continue;
            };
            assert!(s2.notional <= s1.notional);
            let Ok(s3) = pipeline.position_exposure(s2, Some(&position)) else {
                continue;
            };
            assert!(s3.notional <= s2.notional);
        }
    }

    #[test]
    fn test_run_stops_at_first_rejection() {
        let pipeline = ClampPipeline::new(limits());
        let mut daily = DailyVolumeCounter::new(now());

        // Rejected by trade bounds, so the daily counter is never rolled forward.
        let stale = now() - chrono::Duration::days(3);
        let mut stale_daily = DailyVolumeCounter::new(stale);
        assert!(pipeline
            .run(buy(1), &mut stale_daily, now(), None)
            .is_err());
        assert_eq!(stale_daily.day(), stale.date_naive());

        let ok = pipeline.run(buy(20), &mut daily, now(), None).unwrap();
        assert_eq!(ok.notional, Decimal::new(20, 0));
    }
}
