//! Landed cost of a position: average purchase cost plus import charges.
//!
//! `total = containers * per_container + levy_per_tonne * tonnes + variable`,
//! spread over `tonnes * 1000` kg and added to the position's average cost.
//! Decision support only; nothing here touches the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotledger_core::CurrencyCode;

use crate::error::{ValuationError, ValuationResult};
use crate::fx::RateTable;

const KG_PER_TONNE: Decimal = Decimal::ONE_THOUSAND;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCostInputs {
    pub containers: u32,
    pub charge_per_container: Decimal,
    pub levy_per_tonne: Decimal,
    #[serde(default)]
    pub variable_charges: Decimal,
    pub tonnes: Decimal,
    /// Currency all charges are stated in.
    pub charges_currency: CurrencyCode,
}

impl LandedCostInputs {
    fn validate(&self) -> ValuationResult<()> {
        if self.tonnes <= Decimal::ZERO {
            return Err(ValuationError::validation("tonnes must be > 0"));
        }
        let charges = [
            ("charge_per_container", self.charge_per_container),
            ("levy_per_tonne", self.levy_per_tonne),
            ("variable_charges", self.variable_charges),
        ];
        for (name, value) in charges {
            if value < Decimal::ZERO {
                return Err(ValuationError::validation(format!("{name} must be >= 0")));
            }
        }
        Ok(())
    }

    /// Total charges in the charges currency.
    pub fn total_charges(&self) -> ValuationResult<Decimal> {
        let fixed = Decimal::from(self.containers)
            .checked_mul(self.charge_per_container)
            .ok_or_else(|| ValuationError::validation("container charges overflowed"))?;
        let levy = self
            .levy_per_tonne
            .checked_mul(self.tonnes)
            .ok_or_else(|| ValuationError::validation("levy overflowed"))?;
        Ok(fixed + levy + self.variable_charges)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LandedCost {
    pub currency: CurrencyCode,
    pub average_unit_cost: Decimal,
    pub total_charges: Decimal,
    pub charge_per_kg: Decimal,
    pub landed_unit_cost: Decimal,
}

/// Landed unit cost in `cost_currency` (the position's currency).
pub fn landed_cost(
    inputs: &LandedCostInputs,
    average_unit_cost: Decimal,
    cost_currency: &CurrencyCode,
    rates: &RateTable,
) -> ValuationResult<LandedCost> {
    inputs.validate()?;
    if average_unit_cost < Decimal::ZERO {
        return Err(ValuationError::validation("average unit cost must be >= 0"));
    }

    let total_charges = rates.convert(inputs.total_charges()?, &inputs.charges_currency, cost_currency)?;
    let charge_per_kg = total_charges
        .checked_div(inputs.tonnes * KG_PER_TONNE)
        .ok_or_else(|| ValuationError::validation("charge per kg overflowed"))?;

    Ok(LandedCost {
        currency: cost_currency.clone(),
        average_unit_cost,
        total_charges,
        charge_per_kg,
        landed_unit_cost: average_unit_cost + charge_per_kg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    fn rates() -> RateTable {
        RateTable::parse(code("MRU"), NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(), "EUR=0.025").unwrap()
    }

    fn inputs(currency: &str) -> LandedCostInputs {
        LandedCostInputs {
            containers: 2,
            charge_per_container: dec!(100000),
            levy_per_tonne: dec!(1000),
            variable_charges: dec!(30000),
            tonnes: dec!(50),
            charges_currency: code(currency),
        }
    }

    #[test]
    fn spreads_charges_over_tonnage() {
        let cost = landed_cost(&inputs("MRU"), dec!(12), &code("MRU"), &rates()).unwrap();

        // 200000 + 50000 + 30000 over 50000 kg
        assert_eq!(cost.total_charges, dec!(280000));
        assert_eq!(cost.charge_per_kg, dec!(5.6));
        assert_eq!(cost.landed_unit_cost, dec!(17.6));
    }

    #[test]
    fn converts_foreign_charges() {
        let mut eur = inputs("EUR");
        eur.charge_per_container = dec!(2500);
        eur.levy_per_tonne = dec!(25);
        eur.variable_charges = dec!(750);

        let cost = landed_cost(&eur, dec!(12), &code("MRU"), &rates()).unwrap();
        assert_eq!(cost.total_charges, dec!(280000));
        assert_eq!(cost.landed_unit_cost, dec!(17.6));
    }

    #[test]
    fn rejects_zero_tonnage() {
        let mut bad = inputs("MRU");
        bad.tonnes = Decimal::ZERO;
        assert!(matches!(
            landed_cost(&bad, dec!(12), &code("MRU"), &rates()),
            Err(ValuationError::Validation(_))
        ));
    }
}
