//! Monetary amounts.
//!
//! All amounts are `rust_decimal::Decimal` so that index-derived prices
//! (`weight * purity / reference * rate`) stay exact through the formula and
//! only get rounded once, when a quote amount is produced.

use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amount in major currency units (e.g. 12250.50).
pub type Money = Decimal;

/// Decimal places kept on quoted and committed amounts.
pub const MONEY_SCALE: u32 = 2;

/// Round to [`MONEY_SCALE`] places, half away from zero.
pub fn round_money(value: Decimal) -> Money {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum of `amounts`, or `None` if it leaves the representable range.
pub fn checked_sum<I>(amounts: I) -> Option<Money>
where
    I: IntoIterator<Item = Money>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_midpoints_away_from_zero() {
        assert_eq!(round_money(Decimal::new(10005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_money(Decimal::new(-10005, 3)), Decimal::new(-1001, 2));
    }

    #[test]
    fn checked_sum_reports_overflow() {
        assert_eq!(
            checked_sum([Decimal::from(10), Decimal::new(250, 2)]),
            Some(Decimal::new(1250, 2))
        );
        assert_eq!(checked_sum([]), Some(Decimal::ZERO));
        assert_eq!(checked_sum([Decimal::MAX, Decimal::ONE]), None);
    }

    #[test]
    fn leaves_two_place_values_untouched() {
        let v = Decimal::new(1225000, 2);
        assert_eq!(round_money(v), v);
    }
}
