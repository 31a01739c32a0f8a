//! Rolling revenue totals

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{FeeStore, REVENUE_WINDOW_MS};

const DAYS_PER_YEAR: i64 = 365;

/// Fee totals over the trailing 24 hours
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub maker_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub taker_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub grand_total: Decimal,
    /// `grand_total * 365`. A straight-line extrapolation of one day, not a
    /// forecast.
    #[serde(with = "rust_decimal::serde::float")]
    pub projected_annual: Decimal,
    pub event_count: usize,
    /// Epoch milliseconds of the window start
    pub window_start: i64,
}

/// Prune the store, then total maker and taker fees over events with
/// `timestamp >= now - 24h`. Totals saturate at the decimal range.
pub fn compute_24h_totals(store: &mut FeeStore, now_ms: i64) -> RevenueSummary {
    store.prune(now_ms);

    let window_start = now_ms.saturating_sub(REVENUE_WINDOW_MS);
    let mut summary = RevenueSummary {
        window_start,
        ..RevenueSummary::default()
    };

    for event in store.all().iter().filter(|e| e.timestamp >= window_start) {
        summary.maker_total = summary.maker_total.saturating_add(event.maker_fee);
        summary.taker_total = summary.taker_total.saturating_add(event.taker_fee);
        summary.event_count += 1;
    }

    summary.grand_total = summary.maker_total.saturating_add(summary.taker_total);
    summary.projected_annual = summary
        .grand_total
        .saturating_mul(Decimal::from(DAYS_PER_YEAR));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::{FeeEvent, HOUR_MS};
    use rust_decimal_macros::dec;

    const NOW: i64 = 1_700_000_000_000;

    fn event(timestamp: i64, maker: Decimal, taker: Decimal) -> FeeEvent {
        FeeEvent {
            timestamp,
            maker_fee: maker,
            taker_fee: taker,
            total: maker + taker,
            market_id: 1,
            tx_hash: String::new(),
            trade_id: None,
        }
    }

    #[test]
    fn test_totals_cover_trailing_day_only() {
        let mut store = FeeStore::new();
        store.append(event(NOW - HOUR_MS, dec!(0.5), dec!(0.25)));
        store.append(event(NOW - 23 * HOUR_MS, dec!(1), dec!(0)));
        store.append(event(NOW - 25 * HOUR_MS, dec!(100), dec!(100)));

        let summary = compute_24h_totals(&mut store, NOW);
        assert_eq!(summary.maker_total, dec!(1.5));
        assert_eq!(summary.taker_total, dec!(0.25));
        assert_eq!(summary.grand_total, dec!(1.75));
        assert_eq!(summary.projected_annual, dec!(638.75));
        assert_eq!(summary.event_count, 2);
        // Outside the revenue window but still retained
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_moving_event_across_boundary_changes_total() {
        let boundary = NOW - REVENUE_WINDOW_MS;

        let mut store = FeeStore::new();
        store.append(event(boundary, dec!(2), dec!(0)));
        assert_eq!(compute_24h_totals(&mut store, NOW).grand_total, dec!(2));

        let mut store = FeeStore::new();
        store.append(event(boundary - 1, dec!(2), dec!(0)));
        assert_eq!(compute_24h_totals(&mut store, NOW).grand_total, Decimal::ZERO);
    }

    #[test]
    fn test_totals_prune_expired_events() {
        let mut store = FeeStore::new();
        store.append(event(NOW - 50 * HOUR_MS, dec!(1), dec!(1)));

        let summary = compute_24h_totals(&mut store, NOW);
        assert_eq!(summary.event_count, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let mut store = FeeStore::new();
        store.append(event(NOW, Decimal::MAX, Decimal::ZERO));
        store.append(event(NOW, Decimal::MAX, Decimal::ZERO));
        store.append(event(NOW, Decimal::ZERO, Decimal::ONE));

        let summary = compute_24h_totals(&mut store, NOW);
        assert_eq!(summary.maker_total, Decimal::MAX);
        assert_eq!(summary.taker_total, Decimal::ONE);
        assert_eq!(summary.grand_total, Decimal::MAX);
        assert_eq!(summary.projected_annual, Decimal::MAX);
        assert_eq!(summary.event_count, 3);
    }
}
