use chrono::NaiveDate;
use thiserror::Error;

use lotledger_core::CurrencyCode;

pub type ValuationResult<T> = Result<T, ValuationError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValuationError {
    /// The rate table has no entry for a currency involved in a conversion.
    #[error("no exchange rate for {currency} in table of {date}")]
    MissingRate { currency: CurrencyCode, date: NaiveDate },

    /// The rate provider could not deliver a table.
    #[error("currency rates unavailable for {date}: {reason}")]
    RateUnavailable { date: NaiveDate, reason: String },

    #[error("invalid valuation input: {0}")]
    Validation(String),
}

impl ValuationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
