//! Quantities as submitted by callers, normalised to kilograms.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use lotledger_catalog::Article;

use crate::error::{InventoryError, InventoryResult};

/// Largest gap allowed between a requested quantity and the lots allocated to it.
pub const QUANTITY_TOLERANCE_KG: Decimal = dec!(0.01);

/// Sum of kg amounts, failing instead of overflowing.
pub fn checked_total(amounts: impl IntoIterator<Item = Decimal>) -> InventoryResult<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, kg| total.checked_add(kg))
        .ok_or_else(|| InventoryError::overflow("quantity_kg"))
}

pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= QUANTITY_TOLERANCE_KG
}

/// A line quantity in kilograms (canonical) or in cartons of the article's packaging.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Kg(Decimal),
    Cartons(Decimal),
}

impl Quantity {
    pub fn amount(&self) -> Decimal {
        match self {
            Quantity::Kg(v) | Quantity::Cartons(v) => *v,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.amount() > Decimal::ZERO
    }

    pub fn to_kg(&self, article: &Article) -> InventoryResult<Decimal> {
        match self {
            Quantity::Kg(kg) => Ok(*kg),
            Quantity::Cartons(cartons) => article
                .kg_from_cartons(*cartons)
                .map_err(|e| InventoryError::validation("quantity", e.to_string())),
        }
    }
}

impl From<Decimal> for Quantity {
    fn from(kg: Decimal) -> Self {
        Quantity::Kg(kg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotledger_core::{ArticleId, CurrencyCode};

    fn article() -> Article {
        Article::new(
            ArticleId::new(),
            "POULPE-T6",
            dec!(20),
            dec!(95),
            CurrencyCode::new("MRU").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn cartons_normalise_through_packaging() {
        assert_eq!(Quantity::Cartons(dec!(50)).to_kg(&article()).unwrap(), dec!(1000));
        assert_eq!(Quantity::Kg(dec!(12.5)).to_kg(&article()).unwrap(), dec!(12.5));
    }

    #[test]
    fn tolerance_is_inclusive() {
        assert!(within_tolerance(dec!(100), dec!(100.01)));
        assert!(within_tolerance(dec!(100), dec!(99.99)));
        assert!(!within_tolerance(dec!(100), dec!(100.011)));
    }

    #[test]
    fn deserializes_unit_tagged() {
        let q: Quantity = serde_json::from_str(r#"{"cartons": 3}"#).unwrap();
        assert_eq!(q, Quantity::Cartons(dec!(3)));
    }
}
