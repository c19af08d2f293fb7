use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use lotledger_core::{ArticleId, CurrencyCode, DepotId, MovementId};
use lotledger_infra::RateSource;
use lotledger_inventory::MovementKind;
use lotledger_valuation::{LandedCostInputs, RateTable};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitMovementRequest {
    /// Client-chosen id makes resubmission safe; generated when absent.
    #[serde(default)]
    pub movement_id: Option<MovementId>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    pub movement: MovementKind,
}

#[derive(Debug, Deserialize)]
pub struct LotsQuery {
    pub article_id: ArticleId,
    pub depot_id: DepotId,
}

#[derive(Debug, Default, Deserialize)]
pub struct CurrencyQuery {
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

#[derive(Debug, Deserialize)]
pub struct ValuePositionQuery {
    pub depot_id: DepotId,
    pub article_id: ArticleId,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementsQuery {
    #[serde(default)]
    pub after: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRatesRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct LandedCostRequest {
    pub depot_id: DepotId,
    pub article_id: ArticleId,
    pub inputs: LandedCostInputs,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct RatesResponse {
    pub source: RateSource,
    pub rates: RateTable,
}
