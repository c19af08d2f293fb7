//! Engine configuration, read from the environment.
//!
//! Every variable has a default. Malformed values are logged and replaced by
//! the default rather than failing start-up.

use std::time::Duration;

use chrono::Utc;

use lotledger_core::CurrencyCode;
use lotledger_valuation::RateTable;

pub const LOCK_TIMEOUT_VAR: &str = "LOTLEDGER_LOCK_TIMEOUT_MS";
pub const CONFLICT_RETRIES_VAR: &str = "LOTLEDGER_CONFLICT_RETRIES";
pub const BASE_CURRENCY_VAR: &str = "LOTLEDGER_BASE_CURRENCY";
pub const FALLBACK_RATES_VAR: &str = "LOTLEDGER_FALLBACK_RATES";

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CONFLICT_RETRIES: u32 = 3;
const DEFAULT_FALLBACK_RATES: &str = "MRU=1,EUR=0.0232,USD=0.0252";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bounded wait for each position lock.
    pub lock_timeout: Duration,
    /// Extra attempts after a concurrency failure.
    pub conflict_retries: u32,
    pub base_currency: CurrencyCode,
    /// Used when the rate provider fails and nothing is cached.
    pub fallback_rates: RateTable,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let lock_timeout = match lookup(LOCK_TIMEOUT_VAR).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(ms)) => Duration::from_millis(ms),
            Some(Err(e)) => {
                tracing::warn!(var = LOCK_TIMEOUT_VAR, error = %e, "invalid value; using default");
                defaults.lock_timeout
            }
            None => defaults.lock_timeout,
        };

        let conflict_retries = match lookup(CONFLICT_RETRIES_VAR).map(|v| v.trim().parse::<u32>()) {
            Some(Ok(n)) => n,
            Some(Err(e)) => {
                tracing::warn!(var = CONFLICT_RETRIES_VAR, error = %e, "invalid value; using default");
                defaults.conflict_retries
            }
            None => defaults.conflict_retries,
        };

        let base_currency = match lookup(BASE_CURRENCY_VAR).map(CurrencyCode::new) {
            Some(Ok(code)) => code,
            Some(Err(e)) => {
                tracing::warn!(var = BASE_CURRENCY_VAR, error = %e, "invalid value; using default");
                defaults.base_currency.clone()
            }
            None => defaults.base_currency.clone(),
        };

        let raw_rates = lookup(FALLBACK_RATES_VAR).unwrap_or_else(|| DEFAULT_FALLBACK_RATES.to_string());
        let fallback_rates = match RateTable::parse(base_currency.clone(), Utc::now().date_naive(), &raw_rates) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(var = FALLBACK_RATES_VAR, error = %e, "invalid fallback rates; using base currency only");
                base_only(&base_currency)
            }
        };

        Self {
            lock_timeout,
            conflict_retries,
            base_currency,
            fallback_rates,
        }
    }
}

fn base_only(base: &CurrencyCode) -> RateTable {
    RateTable::identity(base.clone(), Utc::now().date_naive())
}

impl Default for EngineConfig {
    fn default() -> Self {
        let base_currency = CurrencyCode::mru();
        let fallback_rates = RateTable::parse(base_currency.clone(), Utc::now().date_naive(), DEFAULT_FALLBACK_RATES)
            .unwrap_or_else(|_| base_only(&base_currency));
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            base_currency,
            fallback_rates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> EngineConfig {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EngineConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = from(&[]);
        assert_eq!(config.lock_timeout, Duration::from_millis(2000));
        assert_eq!(config.conflict_retries, 3);
        assert_eq!(config.base_currency.as_str(), "MRU");
        assert_eq!(config.fallback_rates.currencies().count(), 3);
    }

    #[test]
    fn reads_overrides() {
        let config = from(&[
            (LOCK_TIMEOUT_VAR, "250"),
            (CONFLICT_RETRIES_VAR, "0"),
            (BASE_CURRENCY_VAR, "eur"),
            (FALLBACK_RATES_VAR, "MRU=43.1"),
        ]);
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.conflict_retries, 0);
        assert_eq!(config.base_currency.as_str(), "EUR");
        assert_eq!(config.fallback_rates.base().as_str(), "EUR");
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = from(&[(LOCK_TIMEOUT_VAR, "soon"), (FALLBACK_RATES_VAR, "EUR=-1")]);
        assert_eq!(config.lock_timeout, Duration::from_millis(2000));
        assert_eq!(config.fallback_rates.currencies().count(), 1);
    }
}
