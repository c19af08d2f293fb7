use rust_decimal::Decimal;
use serde::Serialize;

use lotledger_core::{ArticleId, CurrencyCode, DomainError, DomainResult, Entity};

/// A catalog article as seen by the ledger.
///
/// Only the packaging factor may change once lots reference the article
/// (corrections after a supplier changes carton sizes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    id: ArticleId,
    reference: String,
    /// Kilograms of product in one carton. Always strictly positive.
    packaging_kg_per_carton: Decimal,
    reference_cost: Decimal,
    reference_cost_currency: CurrencyCode,
}

impl Article {
    pub fn new(
        id: ArticleId,
        reference: impl Into<String>,
        packaging_kg_per_carton: Decimal,
        reference_cost: Decimal,
        reference_cost_currency: CurrencyCode,
    ) -> DomainResult<Self> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(DomainError::validation("article reference cannot be empty"));
        }
        ensure_packaging(packaging_kg_per_carton)?;
        if reference_cost < Decimal::ZERO {
            return Err(DomainError::validation("reference cost cannot be negative"));
        }

        Ok(Self {
            id,
            reference,
            packaging_kg_per_carton,
            reference_cost,
            reference_cost_currency,
        })
    }

    pub fn id_typed(&self) -> ArticleId {
        self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn packaging_kg_per_carton(&self) -> Decimal {
        self.packaging_kg_per_carton
    }

    pub fn reference_cost(&self) -> Decimal {
        self.reference_cost
    }

    pub fn reference_cost_currency(&self) -> &CurrencyCode {
        &self.reference_cost_currency
    }

    /// Replace the packaging factor.
    pub fn correct_packaging(&mut self, packaging_kg_per_carton: Decimal) -> DomainResult<()> {
        ensure_packaging(packaging_kg_per_carton)?;
        self.packaging_kg_per_carton = packaging_kg_per_carton;
        Ok(())
    }

    pub fn cartons_from_kg(&self, kg: Decimal) -> DomainResult<Decimal> {
        cartons_from_kg(kg, self.packaging_kg_per_carton)
    }

    pub fn kg_from_cartons(&self, cartons: Decimal) -> DomainResult<Decimal> {
        kg_from_cartons(cartons, self.packaging_kg_per_carton)
    }
}

impl Entity for Article {
    type Id = ArticleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn ensure_packaging(packaging_kg_per_carton: Decimal) -> DomainResult<()> {
    if packaging_kg_per_carton <= Decimal::ZERO {
        return Err(DomainError::validation(
            "packaging_kg_per_carton must be strictly positive",
        ));
    }
    Ok(())
}

/// `cartons = kg / packaging`.
pub fn cartons_from_kg(kg: Decimal, packaging_kg_per_carton: Decimal) -> DomainResult<Decimal> {
    ensure_packaging(packaging_kg_per_carton)?;
    kg.checked_div(packaging_kg_per_carton)
        .ok_or_else(|| DomainError::validation("carton conversion overflowed"))
}

/// `kg = cartons * packaging`.
pub fn kg_from_cartons(cartons: Decimal, packaging_kg_per_carton: Decimal) -> DomainResult<Decimal> {
    ensure_packaging(packaging_kg_per_carton)?;
    cartons
        .checked_mul(packaging_kg_per_carton)
        .ok_or_else(|| DomainError::validation("kg conversion overflowed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn mru() -> CurrencyCode {
        CurrencyCode::new("MRU").unwrap()
    }

    fn octopus(packaging: Decimal) -> Article {
        Article::new(ArticleId::new(), "POULPE-T3", packaging, dec!(180), mru()).unwrap()
    }

    #[test]
    fn thousand_kg_in_twenty_kg_cartons_is_fifty_cartons() {
        let article = octopus(dec!(20));
        assert_eq!(article.cartons_from_kg(dec!(1000)).unwrap(), dec!(50.00));
        assert_eq!(article.kg_from_cartons(dec!(50)).unwrap(), dec!(1000));
    }

    #[test]
    fn rejects_non_positive_packaging() {
        let err = Article::new(ArticleId::new(), "SEICHE", dec!(0), dec!(1), mru()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut article = octopus(dec!(12.5));
        assert!(article.correct_packaging(dec!(-1)).is_err());
        assert_eq!(article.packaging_kg_per_carton(), dec!(12.5));
    }

    #[test]
    fn packaging_correction_changes_conversion() {
        let mut article = octopus(dec!(20));
        article.correct_packaging(dec!(25)).unwrap();
        assert_eq!(article.cartons_from_kg(dec!(1000)).unwrap(), dec!(40));
    }

    #[test]
    fn rejects_blank_reference_and_negative_cost() {
        assert!(Article::new(ArticleId::new(), "  ", dec!(10), dec!(1), mru()).is_err());
        assert!(Article::new(ArticleId::new(), "CALMAR", dec!(10), dec!(-1), mru()).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// kg → cartons → kg reproduces the input within 1e-6.
            #[test]
            fn kg_carton_round_trip(
                kg_milli in 1i64..10_000_000_000,
                packaging_milli in 1i64..100_000_000,
            ) {
                let kg = Decimal::new(kg_milli, 3);
                let packaging = Decimal::new(packaging_milli, 3);

                let cartons = cartons_from_kg(kg, packaging).unwrap();
                let back = kg_from_cartons(cartons, packaging).unwrap();

                prop_assert!((back - kg).abs() <= dec!(0.000001), "{kg} -> {cartons} -> {back}");
            }
        }
    }
}
