//! Decimal-safe money arithmetic.
//!
//! All monetary values are `rust_decimal::Decimal` rounded to 2 decimal
//! places with half-away-from-zero semantics, so 1.005 rounds to 1.01
//! exactly. Pure functions, no I/O.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Quantity and unit price of one invoice line, as submitted.
#[derive(Debug, Clone, Copy)]
pub struct LineInput {
    pub qty: Decimal,
    pub unit_price: Decimal,
}

/// Computed invoice totals. `tax_rate` is a percentage (e.g. 13.00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

/// Round to 2 decimal places, half away from zero.
pub fn round2(n: Decimal) -> Decimal {
    n.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Line total for a single item: round2(qty * unit_price).
pub fn line_total(qty: Decimal, unit_price: Decimal) -> Decimal {
    round2(qty * unit_price)
}

/// Compute subtotal, tax and grand total for a set of items.
///
/// The subtotal sums the raw qty * unit_price products and rounds once at
/// the end, not per line, so per-line rounding drift never accumulates.
/// The tax rate is clamped to [0, 100] before use.
pub fn invoice_totals(items: &[LineInput], tax_rate_percent: Decimal) -> InvoiceTotals {
    let tax_rate = round2(tax_rate_percent.clamp(Decimal::ZERO, Decimal::from(100)));

    let subtotal_raw: Decimal = items.iter().map(|it| it.qty * it.unit_price).sum();

    let subtotal = round2(subtotal_raw);
    let tax_total = round2(subtotal * tax_rate / Decimal::from(100));
    let total = round2(subtotal + tax_total);

    InvoiceTotals {
        subtotal,
        tax_rate,
        tax_total,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(qty: &str, unit_price: &str) -> LineInput {
        LineInput {
            qty: dec(qty),
            unit_price: dec(unit_price),
        }
    }

    #[test]
    fn round2_is_half_away_from_zero() {
        assert_eq!(round2(dec("1.005")), dec("1.01"));
        assert_eq!(round2(dec("1.004")), dec("1.00"));
        assert_eq!(round2(dec("-1.005")), dec("-1.01"));
        assert_eq!(round2(dec("2.675")), dec("2.68"));
    }

    #[test]
    fn line_total_rounds_product() {
        assert_eq!(line_total(dec("3"), dec("0.335")), dec("1.01"));
        assert_eq!(line_total(dec("2"), dec("100.00")), dec("200.00"));
    }

    #[test]
    fn two_units_at_100_with_13_percent_vat() {
        let totals = invoice_totals(&[item("2", "100.00")], dec("13"));
        assert_eq!(totals.subtotal, dec("200.00"));
        assert_eq!(totals.tax_rate, dec("13.00"));
        assert_eq!(totals.tax_total, dec("26.00"));
        assert_eq!(totals.total, dec("226.00"));
    }

    #[test]
    fn subtotal_sums_raw_products_before_rounding() {
        // Three lines of 0.333 each: raw sum 0.999 rounds to 1.00, while
        // summing already-rounded line totals (0.33 * 3) would give 0.99.
        let items = vec![item("1", "0.333"), item("1", "0.333"), item("1", "0.333")];
        let totals = invoice_totals(&items, Decimal::ZERO);
        assert_eq!(totals.subtotal, dec("1.00"));
    }

    #[test]
    fn tax_rate_is_clamped() {
        let totals = invoice_totals(&[item("1", "100.00")], dec("150"));
        assert_eq!(totals.tax_rate, dec("100.00"));
        assert_eq!(totals.total, dec("200.00"));

        let totals = invoice_totals(&[item("1", "100.00")], dec("-5"));
        assert_eq!(totals.tax_rate, dec("0.00"));
        assert_eq!(totals.total, dec("100.00"));
    }

    #[test]
    fn totals_invariants_hold() {
        let cases = vec![
            (vec![item("2", "100.00")], "13"),
            (vec![item("1.5", "33.33"), item("7", "0.01")], "13"),
            (vec![item("3", "0.335")], "7.5"),
            (vec![item("1000", "999.99")], "0"),
        ];

        for (items, rate) in cases {
            let t = invoice_totals(&items, dec(rate));
            assert_eq!(t.total, round2(t.subtotal + t.tax_total));
            assert_eq!(t.tax_total, round2(t.subtotal * t.tax_rate / dec("100")));
        }
    }

    #[test]
    fn empty_item_set_totals_zero() {
        let totals = invoice_totals(&[], dec("13"));
        assert_eq!(totals.subtotal, dec("0.00"));
        assert_eq!(totals.total, dec("0.00"));
    }
}
