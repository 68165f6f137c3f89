//! Market State Benchmarks - Hot-Path Performance Validation
//!
//! Benchmarks the writes that run on every poll and every streamed
//! tick, plus the renderer snapshot taken twice per second.
//!
//! Run with: cargo bench --bench state_bench

use std::time::{Duration, Instant};

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use tickerwatch::domain::ticker::{AssetClass, StreamTick, TickerRecord};
use tickerwatch::domain::watchlist::Watchlist;
use tickerwatch::usecases::market_state::{MarketState, Stamp};

const SYMBOLS: usize = 100;

fn symbols() -> Vec<String> {
    (0..SYMBOLS).map(|i| format!("SYM{i:03}")).collect()
}

fn records(last: f64) -> Vec<TickerRecord> {
    symbols()
        .into_iter()
        .map(|s| {
            let mut r = TickerRecord::new(s);
            r.last = Some(last);
            r.prev_close = Some(100.0);
            r.recompute_change();
            r
        })
        .collect()
}

fn stamp() -> Stamp {
    Stamp {
        at: chrono::Utc::now(),
        now: Instant::now(),
    }
}

fn loaded_state() -> (MarketState, u64) {
    let state = MarketState::new(Duration::from_secs(1));
    let list = Watchlist {
        name: "bench".into(),
        stocks: symbols(),
        ..Watchlist::default()
    };
    let generation = state.activate_watchlist(&list);
    state.replace(AssetClass::Stocks, generation, records(101.0), stamp());
    (state, generation)
}

/// Benchmark a full-table snapshot replace.
fn bench_replace(c: &mut Criterion) {
    let (state, generation) = loaded_state();

    c.bench_function("replace_100_symbols", |b| {
        b.iter(|| {
            state.replace(
                AssetClass::Stocks,
                black_box(generation),
                records(102.0),
                stamp(),
            )
        });
    });
}

/// Benchmark a partial merge touching a tenth of the table.
fn bench_merge(c: &mut Criterion) {
    let (state, generation) = loaded_state();
    let subset: Vec<TickerRecord> = records(103.0).into_iter().step_by(10).collect();

    c.bench_function("merge_10_of_100", |b| {
        b.iter(|| state.merge(AssetClass::Stocks, black_box(generation), subset.clone(), stamp()));
    });
}

/// Benchmark applying one streamed tick.
fn bench_apply_tick(c: &mut Criterion) {
    let (state, generation) = loaded_state();
    let tick = StreamTick {
        symbol: "SYM050".into(),
        price: 104.5,
        high: Some(105.0),
        low: None,
        volume: Some(1_000.0),
    };

    c.bench_function("apply_tick", |b| {
        b.iter(|| state.apply_tick(AssetClass::Stocks, black_box(generation), &tick, stamp()));
    });
}

/// Benchmark the renderer snapshot.
fn bench_view(c: &mut Criterion) {
    let (state, _) = loaded_state();

    c.bench_function("dashboard_view", |b| {
        b.iter(|| black_box(state.view(chrono::Utc::now())));
    });
}

criterion_group!(benches, bench_replace, bench_merge, bench_apply_tick, bench_view);
criterion_main!(benches);
