//! Exchange-rate tables and the rate provider boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use lotledger_core::CurrencyCode;

use crate::error::{ValuationError, ValuationResult};

/// Same-day exchange rates expressed against a base currency.
///
/// `rate[X]` is the number of units of `X` worth one unit of the base, so
/// converting `amount` from `A` to `B` is `amount * rate[B] / rate[A]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateTable {
    base: CurrencyCode,
    date: NaiveDate,
    rates: BTreeMap<CurrencyCode, Decimal>,
}

impl RateTable {
    pub fn new(
        base: CurrencyCode,
        date: NaiveDate,
        rates: impl IntoIterator<Item = (CurrencyCode, Decimal)>,
    ) -> ValuationResult<Self> {
        let mut map = BTreeMap::new();
        for (currency, rate) in rates {
            if rate <= Decimal::ZERO {
                return Err(ValuationError::validation(format!(
                    "rate for {currency} must be positive, got {rate}"
                )));
            }
            map.insert(currency, rate);
        }

        match map.get(&base) {
            Some(r) if *r != Decimal::ONE => {
                return Err(ValuationError::validation(format!(
                    "base currency {base} must have rate 1, got {r}"
                )));
            }
            Some(_) => {}
            None => {
                map.insert(base.clone(), Decimal::ONE);
            }
        }

        Ok(Self { base, date, rates: map })
    }

    /// A table that only knows its base currency.
    pub fn identity(base: CurrencyCode, date: NaiveDate) -> Self {
        let rates = BTreeMap::from([(base.clone(), Decimal::ONE)]);
        Self { base, date, rates }
    }

    /// Parse a `CODE=rate,CODE=rate` list.
    pub fn parse(base: CurrencyCode, date: NaiveDate, pairs: &str) -> ValuationResult<Self> {
        let mut rates = Vec::new();
        for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (code, rate) = pair
                .split_once('=')
                .ok_or_else(|| ValuationError::validation(format!("expected CODE=rate, got '{pair}'")))?;
            let code = CurrencyCode::new(code).map_err(|e| ValuationError::validation(e.to_string()))?;
            let rate: Decimal = rate
                .trim()
                .parse()
                .map_err(|e| ValuationError::validation(format!("bad rate for {code}: {e}")))?;
            rates.push((code, rate));
        }
        Self::new(base, date, rates)
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn currencies(&self) -> impl Iterator<Item = &CurrencyCode> {
        self.rates.keys()
    }

    /// The same rates, stamped with another date.
    pub fn with_date(&self, date: NaiveDate) -> Self {
        Self {
            date,
            ..self.clone()
        }
    }

    pub fn rate(&self, currency: &CurrencyCode) -> ValuationResult<Decimal> {
        self.rates
            .get(currency)
            .copied()
            .ok_or_else(|| ValuationError::MissingRate {
                currency: currency.clone(),
                date: self.date,
            })
    }

    /// Multiplier converting amounts in `from` into `to`.
    pub fn factor(&self, from: &CurrencyCode, to: &CurrencyCode) -> ValuationResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        to_rate
            .checked_div(from_rate)
            .ok_or_else(|| ValuationError::validation("rate factor overflowed"))
    }

    pub fn convert(&self, amount: Decimal, from: &CurrencyCode, to: &CurrencyCode) -> ValuationResult<Decimal> {
        if from == to {
            return Ok(amount);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        // Multiply before dividing to keep small rates exact.
        amount
            .checked_mul(to_rate)
            .and_then(|v| v.checked_div(from_rate))
            .ok_or_else(|| ValuationError::validation("currency conversion overflowed"))
    }
}

/// Source of daily exchange-rate tables.
pub trait CurrencyRateProvider: Send + Sync {
    fn get_rates(&self, date: NaiveDate) -> ValuationResult<RateTable>;
}

impl<P> CurrencyRateProvider for Arc<P>
where
    P: CurrencyRateProvider + ?Sized,
{
    fn get_rates(&self, date: NaiveDate) -> ValuationResult<RateTable> {
        (**self).get_rates(date)
    }
}

/// Provider that always answers with a fixed table (re-dated to the request).
#[derive(Debug, Clone)]
pub struct StaticRateProvider {
    table: RateTable,
}

impl StaticRateProvider {
    pub fn new(table: RateTable) -> Self {
        Self { table }
    }
}

impl CurrencyRateProvider for StaticRateProvider {
    fn get_rates(&self, date: NaiveDate) -> ValuationResult<RateTable> {
        Ok(self.table.with_date(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
    }

    #[test]
    fn base_currency_is_implicit() {
        let table = RateTable::parse(code("MRU"), day(), "EUR=0.025").unwrap();
        assert_eq!(table.rate(&code("MRU")).unwrap(), Decimal::ONE);
        assert_eq!(table.currencies().count(), 2);
    }

    #[test]
    fn converts_through_the_base() {
        let table = RateTable::parse(code("MRU"), day(), "EUR=0.025,USD=0.0275").unwrap();

        assert_eq!(table.convert(dec!(1000), &code("MRU"), &code("EUR")).unwrap(), dec!(25));
        assert_eq!(table.convert(dec!(25), &code("EUR"), &code("MRU")).unwrap(), dec!(1000));
        assert_eq!(table.convert(dec!(100), &code("EUR"), &code("USD")).unwrap(), dec!(110));
        assert_eq!(table.factor(&code("USD"), &code("USD")).unwrap(), Decimal::ONE);
    }

    #[test]
    fn rejects_bad_tables() {
        assert!(RateTable::parse(code("MRU"), day(), "EUR=0").is_err());
        assert!(RateTable::parse(code("MRU"), day(), "EUR").is_err());
        assert!(RateTable::parse(code("MRU"), day(), "MRU=2").is_err());
        assert!(RateTable::parse(code("MRU"), day(), "EUR=abc").is_err());
    }

    #[test]
    fn static_provider_redates_its_table() {
        let provider = StaticRateProvider::new(RateTable::parse(code("MRU"), day(), "EUR=0.025").unwrap());
        let next_day = day().succ_opt().unwrap();
        assert_eq!(provider.get_rates(next_day).unwrap().date(), next_day);
    }
}
