//! Daily cache in front of the currency rate provider.
//!
//! The provider is asked at most once per business date. When it fails the
//! last good table keeps serving; before any success, the configured static
//! rates do. Every fallback is logged.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use lotledger_valuation::{CurrencyRateProvider, RateTable};

/// Where the table currently served came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Fetched from the provider for the requested date.
    Fresh,
    /// Provider failed; serving the last table it returned.
    Cached,
    /// Provider never answered; serving the static rates.
    Fallback,
}

#[derive(Debug)]
struct CacheState {
    table: Option<RateTable>,
    attempted_on: Option<NaiveDate>,
    source: RateSource,
}

pub struct RateCache {
    provider: Arc<dyn CurrencyRateProvider>,
    fallback: RateTable,
    state: RwLock<CacheState>,
}

impl core::fmt::Debug for RateCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RateCache")
            .field("fallback", &self.fallback)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl RateCache {
    pub fn new(provider: Arc<dyn CurrencyRateProvider>, fallback: RateTable) -> Self {
        Self {
            provider,
            fallback,
            state: RwLock::new(CacheState {
                table: None,
                attempted_on: None,
                source: RateSource::Fallback,
            }),
        }
    }

    /// Rates to use on `date`, refreshing once if the date has not been tried yet.
    pub fn rates_for(&self, date: NaiveDate) -> RateTable {
        {
            let state = self.state.read();
            if state.attempted_on == Some(date) {
                return self.serve(&state, date);
            }
        }
        self.refresh(date)
    }

    /// Ask the provider now, regardless of what was fetched earlier today.
    pub fn refresh(&self, date: NaiveDate) -> RateTable {
        let fetched = self.provider.get_rates(date);
        let mut state = self.state.write();
        state.attempted_on = Some(date);

        match fetched {
            Ok(table) => {
                info!(date = %date, currencies = table.currencies().count(), "currency rates refreshed");
                state.table = Some(table);
                state.source = RateSource::Fresh;
            }
            Err(err) => {
                state.source = if state.table.is_some() {
                    RateSource::Cached
                } else {
                    RateSource::Fallback
                };
                warn!(date = %date, error = %err, source = ?state.source, "currency rate provider unavailable");
            }
        }
        self.serve(&state, date)
    }

    pub fn source(&self) -> RateSource {
        self.state.read().source
    }

    fn serve(&self, state: &CacheState, date: NaiveDate) -> RateTable {
        match &state.table {
            Some(table) => table.clone(),
            None => self.fallback.with_date(date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use lotledger_core::CurrencyCode;
    use lotledger_valuation::{ValuationError, ValuationResult};
    use rust_decimal_macros::dec;

    struct Flaky {
        calls: AtomicUsize,
        up: AtomicBool,
    }

    impl CurrencyRateProvider for Flaky {
        fn get_rates(&self, date: NaiveDate) -> ValuationResult<RateTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.up.load(Ordering::SeqCst) {
                RateTable::parse(CurrencyCode::mru(), date, "EUR=0.023")
            } else {
                Err(ValuationError::RateUnavailable {
                    date,
                    reason: "timeout".into(),
                })
            }
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn cache(up: bool) -> (Arc<Flaky>, RateCache) {
        let provider = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            up: AtomicBool::new(up),
        });
        let fallback = RateTable::parse(CurrencyCode::mru(), day(1), "EUR=0.025").unwrap();
        (provider.clone(), RateCache::new(provider, fallback))
    }

    #[test]
    fn asks_the_provider_once_per_day() {
        let (provider, cache) = cache(true);
        cache.rates_for(day(2));
        cache.rates_for(day(2));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.source(), RateSource::Fresh);

        cache.rates_for(day(3));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn falls_back_to_static_then_cached() {
        let (provider, cache) = cache(false);
        let eur = CurrencyCode::new("EUR").unwrap();

        let table = cache.rates_for(day(2));
        assert_eq!(cache.source(), RateSource::Fallback);
        assert_eq!(table.rate(&eur).unwrap(), dec!(0.025));
        assert_eq!(table.date(), day(2));

        provider.up.store(true, Ordering::SeqCst);
        cache.refresh(day(2));
        provider.up.store(false, Ordering::SeqCst);

        let table = cache.rates_for(day(3));
        assert_eq!(cache.source(), RateSource::Cached);
        assert_eq!(table.rate(&eur).unwrap(), dec!(0.023));
    }
}
