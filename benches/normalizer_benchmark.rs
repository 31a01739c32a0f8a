//! Benchmarks for frame ingestion and revenue aggregation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dex_fee_indexer::fees::{compute_24h_totals, FeeStore};
use dex_fee_indexer::parser::fee_event_from_trade;
use dex_fee_indexer::{Config, FeeIndexer};
use rust_decimal::Decimal;
use serde_json::json;

const NOW: i64 = 1_700_000_000_000;

fn create_trade_frame(trades: usize) -> String {
    let trades: Vec<_> = (0..trades)
        .map(|i| {
            json!({
                "trade_id": i,
                "market_id": i % 64,
                "maker_fee": if i % 3 == 0 { 0 } else { 1_500 },
                "taker_fee": 4_200,
                "timestamp": NOW / 1000 - i as i64,
                "tx_hash": format!("0x{:064x}", i)
            })
        })
        .collect();

    json!({ "type": "update/trade", "channel": "trade:0", "trades": trades }).to_string()
}

fn benchmark_trade_extraction(c: &mut Criterion) {
    let trade = json!({
        "maker_fee": "500000",
        "taker_fee": 250000,
        "timestamp": 1700000000,
        "market_id": 3,
        "tx_hash": "0xabc"
    });
    let divisor = Decimal::from(1_000_000);

    c.bench_function("fee_event_from_trade", |b| {
        b.iter(|| fee_event_from_trade(black_box(&trade), divisor, NOW))
    });
}

fn benchmark_handle_message(c: &mut Criterion) {
    let frame = create_trade_frame(100);

    c.bench_function("handle_trade_frame_100", |b| {
        b.iter(|| {
            let mut indexer = FeeIndexer::new(&Config::default()).unwrap();
            indexer.handle_message(black_box(&frame), NOW)
        })
    });
}

fn benchmark_revenue(c: &mut Criterion) {
    let mut indexer = FeeIndexer::new(&Config::default()).unwrap();
    let frame = create_trade_frame(1_000);
    for _ in 0..10 {
        indexer.handle_message(&frame, NOW);
    }

    c.bench_function("revenue_24h_10k_events", |b| {
        b.iter(|| black_box(indexer.revenue_24h(NOW)))
    });

    c.bench_function("compute_24h_totals_empty", |b| {
        b.iter(|| {
            let mut store = FeeStore::new();
            black_box(compute_24h_totals(&mut store, NOW))
        })
    });
}

criterion_group!(
    benches,
    benchmark_trade_extraction,
    benchmark_handle_message,
    benchmark_revenue
);
criterion_main!(benches);
