//! Latency benchmarks for the per-trade decision path.
//!
//! Run with: `cargo bench --bench latency`

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polymarket_core::config::RiskLimits;
use polymarket_core::types::{ObservedTrade, OrderSide, Position, SizingStrategy};
use risk_manager::{ClampPipeline, DailyVolumeCounter};
use rust_decimal::Decimal;
use std::collections::HashMap;
use trading_engine::{batch_positions, MirrorLedger, Sizer};

fn sample_trade(i: i64) -> ObservedTrade {
    ObservedTrade {
        trader: "0xtrader".to_string(),
        tx_hash: format!("0x{i:064x}"),
        timestamp: 1_700_000_000 + i,
        condition_id: "cond".to_string(),
        asset_id: "token".to_string(),
        side: if i % 3 == 0 { OrderSide::Sell } else { OrderSide::Buy },
        price: Decimal::new(40 + i % 50, 2),
        size: Decimal::new(100 + i, 0),
        usd_size: Decimal::new(40 + i, 0),
        outcome: None,
        title: None,
    }
}

fn limits() -> RiskLimits {
    RiskLimits {
        min_trade_usd: Decimal::ONE,
        max_trade_usd: Decimal::new(100, 0),
        daily_cap_usd: Decimal::new(1000, 0),
        position_cap_usd: Decimal::new(500, 0),
    }
}

/// Benchmark each sizing strategy.
fn bench_sizing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sizing");
    let trade = sample_trade(7);

    let strategies = [
        ("percent_usd", SizingStrategy::PercentUsd { ratio: Decimal::new(25, 2) }),
        ("percent_shares", SizingStrategy::PercentShares { ratio: Decimal::new(25, 2) }),
        ("fixed_usd", SizingStrategy::FixedUsd { usd: Decimal::new(10, 0) }),
        ("fixed_shares", SizingStrategy::FixedShares { shares: Decimal::new(20, 0) }),
    ];

    for (name, strategy) in strategies {
        let sizer = Sizer::new(strategy, HashMap::new());
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(name), &sizer, |b, sizer| {
            b.iter(|| sizer.size(black_box(&trade)))
        });
    }

    group.finish();
}

/// Benchmark the full clamp pipeline.
fn bench_clamp(c: &mut Criterion) {
    let pipeline = ClampPipeline::new(limits());
    let sizer = Sizer::new(
        SizingStrategy::PercentUsd { ratio: Decimal::new(25, 2) },
        HashMap::new(),
    );
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let held = Position {
        condition_id: "cond".to_string(),
        asset_id: "token".to_string(),
        outcome_index: 0,
        size: Decimal::new(200, 0),
        avg_price: Decimal::new(45, 2),
        cur_price: Decimal::new(50, 2),
        redeemable: false,
        negative_risk: false,
    };
    let candidates: Vec<_> = (0..64).filter_map(|i| sizer.size(&sample_trade(i))).collect();

    c.bench_function("clamp_pipeline", |b| {
        b.iter(|| {
            let mut daily = DailyVolumeCounter::new(now);
            for candidate in &candidates {
                let _ = pipeline.run(black_box(*candidate), &mut daily, now, Some(&held));
            }
        })
    });
}

/// Benchmark fingerprint dedup against a populated seen set.
fn bench_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup");

    for seen in [1_000usize, 10_000, 100_000] {
        let mut ledger = MirrorLedger::default();
        for i in 0..seen as i64 {
            ledger.note_seen(&sample_trade(i).fingerprint(), i);
        }
        let lookup = sample_trade(seen as i64 / 2);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(seen), &ledger, |b, ledger| {
            b.iter(|| ledger.is_seen(black_box(&lookup.fingerprint())))
        });
    }

    group.finish();
}

/// Benchmark redemption batching.
fn bench_redemption_batching(c: &mut Criterion) {
    let positions: Vec<Position> = (0..500)
        .map(|i| Position {
            condition_id: format!("cond-{}", i / 2),
            asset_id: format!("token-{i}"),
            outcome_index: (i % 2) as u32,
            size: Decimal::new(10 + i as i64, 0),
            avg_price: Decimal::new(50, 2),
            cur_price: Decimal::ONE,
            redeemable: true,
            negative_risk: i % 4 < 2,
        })
        .collect();

    c.bench_function("batch_positions_500", |b| {
        b.iter(|| batch_positions(black_box(&positions)))
    });
}

criterion_group!(
    benches,
    bench_sizing,
    bench_clamp,
    bench_dedup,
    bench_redemption_batching,
);

criterion_main!(benches);
