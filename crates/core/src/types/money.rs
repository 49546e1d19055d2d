//! Decimal money helpers.
//!
//! Prices are plain [`Decimal`] amounts in the store currency (USD). These
//! helpers keep rounding consistent between cart display, checkout totals, and
//! refunds.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round an amount to cents, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Apply a percentage discount (0-100) to a price and round to cents.
///
/// Percentages outside `0..=100` are clamped.
///
/// ```
/// use insightshop_core::apply_discount;
/// use rust_decimal::Decimal;
///
/// assert_eq!(apply_discount(Decimal::new(4999, 2), 20), Decimal::new(3999, 2));
/// ```
#[must_use]
pub fn apply_discount(price: Decimal, percentage: i32) -> Decimal {
    let pct = Decimal::from(percentage.clamp(0, 100));
    round_money(price - price * pct / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(10_005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_money(Decimal::new(10_004, 3)), Decimal::new(1000, 2));
    }

    #[test]
    fn test_apply_discount_zero_is_identity() {
        assert_eq!(apply_discount(Decimal::new(2500, 2), 0), Decimal::new(2500, 2));
    }

    #[test]
    fn test_apply_discount_clamps() {
        assert_eq!(apply_discount(Decimal::new(2500, 2), 150), Decimal::ZERO);
        assert_eq!(apply_discount(Decimal::new(2500, 2), -5), Decimal::new(2500, 2));
    }

    #[test]
    fn test_apply_discount_rounds_to_cents() {
        // 19.99 * 0.85 = 16.9915
        assert_eq!(apply_discount(Decimal::new(1999, 2), 15), Decimal::new(1699, 2));
    }
}
