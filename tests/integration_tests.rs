//! Integration tests for component interactions.
//!
//! These tests drive the mirror engine, clamp pipeline, state store and
//! redemption batcher together through their public APIs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use polymarket_core::api::{PositionSource, TradeWindow};
use polymarket_core::config::{Config, RiskLimits};
use polymarket_core::types::{ObservedTrade, OrderSide, Position, SizingStrategy};
use risk_manager::{Candidate, ClampPipeline, ClampRejection, ClampStage, DailyVolumeCounter};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use trading_engine::{
    batch_positions, CopyTrader, DryRunRelay, JsonFileStore, MirrorLedger, MirrorOutcome,
    PaperExecutor, RedeemLedger, RedemptionBatcher, SettlementInstruction, Sizer, StateHandle,
    StateStore,
};

struct Holdings(Vec<Position>);

#[async_trait]
impl PositionSource for Holdings {
    async fn fetch_positions(
        &self,
        _account: &str,
        redeemable_only: bool,
    ) -> polymarket_core::Result<Vec<Position>> {
        Ok(self
            .0
            .iter()
            .filter(|p| !redeemable_only || p.redeemable)
            .cloned()
            .collect())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 0).unwrap()
}

fn trade(tx: &str, side: OrderSide, price: Decimal, size: Decimal) -> ObservedTrade {
    ObservedTrade {
        trader: "0xtrader".to_string(),
        tx_hash: tx.to_string(),
        timestamp: now().timestamp() - 30,
        condition_id: "cond".to_string(),
        asset_id: "token".to_string(),
        side,
        price,
        size,
        usd_size: size * price,
        outcome: Some("Yes".to_string()),
        title: Some("Will it rain?".to_string()),
    }
}

fn position(condition: &str, outcome_index: u32, size: i64, neg_risk: bool) -> Position {
    Position {
        condition_id: condition.to_string(),
        asset_id: format!("{condition}-{outcome_index}"),
        outcome_index,
        size: Decimal::new(size, 0),
        avg_price: Decimal::new(40, 2),
        cur_price: Decimal::ONE,
        redeemable: true,
        negative_risk: neg_risk,
    }
}

fn temp_state_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("poly-mirror-{}", uuid::Uuid::new_v4()))
        .join(name)
}

/// Sizing plus clamping reproduces the reference BUY scenario.
#[test]
fn test_percent_usd_sizing_then_clamp() {
    let sizer = Sizer::new(
        SizingStrategy::PercentUsd {
            ratio: Decimal::new(25, 2),
        },
        HashMap::new(),
    );
    let observed = trade("0x1", OrderSide::Buy, Decimal::new(40, 2), Decimal::new(100, 0));
    let candidate = sizer.size(&observed).unwrap();
    assert_eq!(candidate.notional, Decimal::new(10, 0));
    assert_eq!(candidate.size, Decimal::new(25, 0));

    let pipeline = ClampPipeline::new(RiskLimits {
        min_trade_usd: Decimal::ONE,
        max_trade_usd: Decimal::new(100, 0),
        daily_cap_usd: Decimal::new(30, 0),
        position_cap_usd: Decimal::new(500, 0),
    });
    let mut daily = DailyVolumeCounter::new(now());
    let clamped = pipeline.run(candidate, &mut daily, now(), None).unwrap();
    assert_eq!(clamped, candidate);
}

/// BUY notional 50 against a 30 cap with 25 spent: shrink to 5, or reject under a $10 minimum.
#[test]
fn test_daily_cap_scenario() {
    let candidate =
        Candidate::from_notional(OrderSide::Buy, Decimal::new(50, 2), Decimal::new(50, 0)).unwrap();
    let mut limits = RiskLimits {
        min_trade_usd: Decimal::ONE,
        max_trade_usd: Decimal::new(100, 0),
        daily_cap_usd: Decimal::new(30, 0),
        position_cap_usd: Decimal::new(500, 0),
    };
    let mut daily = DailyVolumeCounter::new(now());
    daily.record(now(), Decimal::new(25, 0));

    let shrunk = ClampPipeline::new(limits.clone())
        .run(candidate, &mut daily, now(), None)
        .unwrap();
    assert_eq!(shrunk.notional, Decimal::new(5, 0));

    limits.min_trade_usd = Decimal::new(10, 0);
    let rejected = ClampPipeline::new(limits)
        .run(candidate, &mut daily, now(), None)
        .unwrap_err();
    assert!(matches!(
        rejected,
        ClampRejection::BelowMinimum {
            stage: ClampStage::DailyVolume,
            ..
        }
    ));
}

/// SELL 80 against 50 held clamps to 50 at the trade price.
#[test]
fn test_sell_clamp_scenario() {
    let price = Decimal::new(40, 2);
    let candidate = Candidate::from_size(OrderSide::Sell, price, Decimal::new(80, 0)).unwrap();
    let pipeline = ClampPipeline::new(Config::test_config().risk);
    let mut held = position("cond", 0, 50, false);
    held.redeemable = false;

    let mut daily = DailyVolumeCounter::new(now());
    let clamped = pipeline.run(candidate, &mut daily, now(), Some(&held)).unwrap();
    assert_eq!(clamped.size, Decimal::new(50, 0));
    assert_eq!(clamped.notional, Decimal::new(50, 0) * price);
}

/// Two negative-risk outcomes of one market become one instruction in base units.
#[test]
fn test_neg_risk_redemption_scenario() {
    let positions = vec![position("c1", 0, 10, true), position("c1", 1, 5, true)];
    assert_eq!(
        batch_positions(&positions),
        vec![SettlementInstruction::NegRisk {
            condition_id: "c1".to_string(),
            amounts: [10_000000, 5_000000],
        }]
    );
}

/// Seen trades and spend survive a restart through the JSON store, and the
/// daily counter rolls over at midnight UTC.
#[tokio::test]
async fn test_state_survives_restart() {
    let path = temp_state_path("state.json");
    let config = Config::test_config();
    let observed = trade("0xabc", OrderSide::Buy, Decimal::new(40, 2), Decimal::new(100, 0));

    {
        let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(path.clone()));
        let state = StateHandle::load(store).await.unwrap();
        let mut copier = CopyTrader::new(
            &config,
            Arc::new(PaperExecutor::default()),
            Arc::new(Holdings(vec![])),
            state.mirror().await,
        );
        let outcome = copier.process_trade(&observed, now()).await.unwrap();
        assert!(matches!(outcome, MirrorOutcome::Submitted(_)));
        state.commit_mirror(copier.ledger()).await.unwrap();
    }

    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(path.clone()));
    let state = StateHandle::load(store).await.unwrap();
    let mut ledger: MirrorLedger = state.mirror().await;
    assert!(ledger.is_seen(&observed.fingerprint()));
    assert_eq!(ledger.daily_volume.spent(now()), Decimal::new(10, 0));

    let mut copier = CopyTrader::new(
        &config,
        Arc::new(PaperExecutor::default()),
        Arc::new(Holdings(vec![])),
        state.mirror().await,
    );
    let replay = copier.process_trade(&observed, now()).await.unwrap();
    assert!(matches!(replay, MirrorOutcome::AlreadySeen));

    let tomorrow = now() + Duration::minutes(2);
    assert_eq!(ledger.daily_volume.spent(tomorrow), Decimal::ZERO);

    if let Some(dir) = path.parent() {
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}

/// Mirror and redeem regions committed from both sides land in one snapshot.
#[tokio::test]
async fn test_mirror_and_redeem_share_state_file() {
    let path = temp_state_path("shared.json");
    let config = Config::test_config();
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(path.clone()));
    let state = Arc::new(StateHandle::load(store.clone()).await.unwrap());

    let mut copier = CopyTrader::new(
        &config,
        Arc::new(PaperExecutor::default()),
        Arc::new(Holdings(vec![])),
        state.mirror().await,
    );
    let batch = TradeWindow::complete(
        now().timestamp() - 3600,
        now().timestamp(),
        vec![trade(
            "0xdef",
            OrderSide::Buy,
            Decimal::new(50, 2),
            Decimal::new(40, 0),
        )],
    );
    copier.mirror_batch("0xtrader", &batch, now()).await.unwrap();

    let relay = Arc::new(DryRunRelay::new());
    let mut batcher = RedemptionBatcher::new(
        config.mirror.account.clone(),
        &config.redeem,
        Arc::new(Holdings(vec![position("resolved", 1, 3, false)])),
        relay.clone(),
        RedeemLedger::default(),
    );
    let report = batcher.sweep(now()).await.unwrap();
    assert_eq!(report.submitted, 1);

    let mirror_state = state.clone();
    let ledger = copier.ledger().clone();
    let mirror_commit =
        tokio::spawn(async move { mirror_state.commit_mirror(&ledger).await });
    state.commit_redeem(batcher.ledger()).await.unwrap();
    mirror_commit.await.unwrap().unwrap();

    let saved = store.load().await.unwrap();
    assert_eq!(saved.mirror.cursor("0xtrader"), Some(batch.trades[0].timestamp));
    assert_eq!(
        saved.redeem.last_attempt("resolved"),
        Some(now().timestamp())
    );
    assert_eq!(
        relay.submitted(),
        vec![SettlementInstruction::Standard {
            condition_id: "resolved".to_string()
        }]
    );

    if let Some(dir) = path.parent() {
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
