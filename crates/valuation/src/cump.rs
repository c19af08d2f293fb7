//! Weighted-average unit cost (CUMP) and lot valuation.
//!
//! A position's average cost is carried as `inventory value / quantity`.
//! Receiving `q` kg at cost `c` adds `q * c` to the value, which is the
//! recurrence `(avg * qty + c * q) / (qty + q)` without compounding rounding
//! across steps, so the result does not depend on the order of receipts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotledger_core::CurrencyCode;

use crate::error::{ValuationError, ValuationResult};
use crate::fx::RateTable;

/// Average of `value` over `quantity`; `None` when there is no quantity.
pub fn average_over(value: Decimal, quantity: Decimal) -> Option<Decimal> {
    if quantity <= Decimal::ZERO {
        return None;
    }
    value.checked_div(quantity)
}

/// Quantity-weighted mean of `(quantity, unit price)` pairs.
///
/// Pairs with non-positive quantity do not contribute. Returns `None` when no
/// quantity contributed or the sums overflow.
pub fn weighted_mean(pairs: impl IntoIterator<Item = (Decimal, Decimal)>) -> Option<Decimal> {
    let (weighted, total) = pairs
        .into_iter()
        .filter(|(qty, _)| *qty > Decimal::ZERO)
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(w, t), (qty, price)| {
            Some((w.checked_add(qty.checked_mul(price)?)?, t.checked_add(qty)?))
        })?;
    average_over(weighted, total)
}

/// A quantity held at a unit cost in a currency (typically one lot's remainder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuedQuantity {
    pub quantity_kg: Decimal,
    pub unit_cost: Decimal,
    pub currency: CurrencyCode,
}

/// `Σ quantity * unit_cost * rate[target] / rate[currency]`.
pub fn value_in<'a>(
    items: impl IntoIterator<Item = &'a ValuedQuantity>,
    target: &CurrencyCode,
    rates: &RateTable,
) -> ValuationResult<Decimal> {
    let mut total = Decimal::ZERO;
    for item in items {
        let native = item
            .quantity_kg
            .checked_mul(item.unit_cost)
            .ok_or_else(|| ValuationError::validation("lot value overflowed"))?;
        total = total
            .checked_add(rates.convert(native, &item.currency, target)?)
            .ok_or_else(|| ValuationError::validation("lot value overflowed"))?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    fn table() -> RateTable {
        RateTable::parse(
            code("MRU"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "MRU=1,EUR=0.025,USD=0.0275",
        )
        .unwrap()
    }

    #[test]
    fn average_is_undefined_without_quantity() {
        assert_eq!(average_over(dec!(100), Decimal::ZERO), None);
        assert_eq!(average_over(dec!(18000), dec!(1500)), Some(dec!(12)));
    }

    #[test]
    fn weighted_mean_ignores_empty_pairs() {
        let mean = weighted_mean([(dec!(1000), dec!(10)), (dec!(500), dec!(16)), (dec!(0), dec!(99))]);
        assert_eq!(mean, Some(dec!(12)));
        assert_eq!(weighted_mean(Vec::new()), None);
    }

    #[test]
    fn values_lots_across_currencies() {
        let lots = vec![
            ValuedQuantity { quantity_kg: dec!(100), unit_cost: dec!(40), currency: code("MRU") },
            ValuedQuantity { quantity_kg: dec!(10), unit_cost: dec!(2), currency: code("EUR") },
        ];

        // 4000 MRU + 20 EUR (= 800 MRU)
        assert_eq!(value_in(&lots, &code("MRU"), &table()).unwrap(), dec!(4800));
        // 4000 MRU (= 100 EUR) + 20 EUR
        assert_eq!(value_in(&lots, &code("EUR"), &table()).unwrap(), dec!(120));
    }

    #[test]
    fn valuation_fails_on_unknown_currency() {
        let lots = vec![ValuedQuantity { quantity_kg: dec!(1), unit_cost: dec!(1), currency: code("JPY") }];
        assert!(matches!(
            value_in(&lots, &code("MRU"), &table()),
            Err(ValuationError::MissingRate { .. })
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn as_decimal(receipts: &[(i64, i64)]) -> Vec<(Decimal, Decimal)> {
            receipts
                .iter()
                .map(|(q, c)| (Decimal::new(*q, 2), Decimal::new(*c, 2)))
                .collect()
        }

        fn accumulate(pairs: &[(Decimal, Decimal)]) -> Option<Decimal> {
            let (value, qty) = pairs
                .iter()
                .fold((Decimal::ZERO, Decimal::ZERO), |(v, t), (q, c)| (v + q * c, t + q));
            average_over(value, qty)
        }

        proptest! {
            /// Receipts in any order give Σ(q·c)/Σq.
            #[test]
            fn receipt_order_does_not_change_average(
                receipts in prop::collection::vec((1i64..1_000_000, 0i64..100_000), 1..20),
                seed in any::<u64>(),
            ) {
                let forward = accumulate(&as_decimal(&receipts));

                let mut reordered = receipts.clone();
                let n = reordered.len();
                reordered.rotate_left((seed as usize) % n);
                reordered.reverse();
                let shuffled = accumulate(&as_decimal(&reordered));

                prop_assert_eq!(forward, shuffled);
                prop_assert_eq!(forward, weighted_mean(as_decimal(&reordered)));
            }
        }
    }
}
