//! Composition root: wires stores, processor, aggregator and rate cache.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use lotledger_catalog::{ArticleCatalog, DepotRegistry};
use lotledger_core::{ArticleId, CurrencyCode, DepotId, DomainError};
use lotledger_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use lotledger_inventory::{
    InventoryError, InventoryResult, Lot, Movement, MovementApplied, MovementKind, MovementRejection, PositionKey,
    StockPosition,
};
use lotledger_valuation::{CurrencyRateProvider, LandedCost, LandedCostInputs, RateTable, landed_cost};

use crate::aggregator::{
    ArticleRollup, DepotSummary, GlobalRollup, PositionFilter, PositionValuation, PositionView, StockAggregator,
};
use crate::config::EngineConfig;
use crate::fx_cache::{RateCache, RateSource};
use crate::lot_ledger::InMemoryLotLedger;
use crate::movement_log::{InMemoryMovementLog, MovementLog, StoredMovement};
use crate::position_store::{InMemoryPositionStore, PositionStore};
use crate::processor::{MovementProcessor, MovementReceipt, PositionAdjustment};
use crate::replay::{self, ReplayError, ReplayReport};

pub type LedgerBus = InMemoryEventBus<EventEnvelope<MovementApplied>>;

type Processor =
    MovementProcessor<Arc<InMemoryLotLedger>, Arc<InMemoryPositionStore>, Arc<InMemoryMovementLog>, Arc<LedgerBus>>;

/// The in-memory ledger engine.
///
/// Owns every store; callers hold it behind an `Arc` and share it across
/// threads.
pub struct InventoryEngine {
    config: EngineConfig,
    processor: Processor,
    aggregator: StockAggregator<Arc<InMemoryLotLedger>, Arc<InMemoryPositionStore>>,
    rates: RateCache,
}

impl InventoryEngine {
    pub fn new<C>(config: EngineConfig, catalog: Arc<C>, rate_provider: Arc<dyn CurrencyRateProvider>) -> Self
    where
        C: ArticleCatalog + DepotRegistry + 'static,
    {
        let lots = Arc::new(InMemoryLotLedger::new());
        let positions = Arc::new(InMemoryPositionStore::new());
        let log = Arc::new(InMemoryMovementLog::new());
        let bus = Arc::new(LedgerBus::new());

        let processor = MovementProcessor::new(lots.clone(), positions.clone(), log, bus, catalog.clone(), &config);
        let aggregator = StockAggregator::new(lots, positions, catalog);
        let rates = RateCache::new(rate_provider, config.fallback_rates.clone());

        Self {
            config,
            processor,
            aggregator,
            rates,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn apply_movement(&self, movement: Movement) -> Result<MovementReceipt, MovementRejection> {
        self.processor.apply_movement(movement)
    }

    /// Apply a movement of `kind` dated now.
    pub fn submit(&self, kind: MovementKind) -> Result<MovementReceipt, MovementRejection> {
        self.processor.submit(kind, None)
    }

    pub fn adjust_position(&self, adjustment: PositionAdjustment) -> Result<StockPosition, MovementRejection> {
        self.processor.adjust_position(adjustment)
    }

    pub fn position(&self, depot_id: DepotId, article_id: ArticleId) -> Option<StockPosition> {
        self.processor.positions().get(&PositionKey::new(depot_id, article_id))
    }

    pub fn query_positions(&self, filter: &PositionFilter) -> Vec<StockPosition> {
        self.aggregator.query_positions(filter)
    }

    pub fn position_views(&self, filter: &PositionFilter) -> Vec<PositionView> {
        self.aggregator.position_views(filter)
    }

    pub fn query_available_lots(&self, article_id: ArticleId, depot_id: DepotId) -> Vec<Lot> {
        self.aggregator.query_available_lots(article_id, depot_id)
    }

    /// Rollups and valuations default to the base currency.
    pub fn article_rollup(&self, article_id: ArticleId, currency: Option<CurrencyCode>) -> InventoryResult<ArticleRollup> {
        let currency = self.currency_or_base(currency);
        self.aggregator.article_rollup(article_id, &currency, &self.rates_today())
    }

    pub fn global_rollup(&self, currency: Option<CurrencyCode>) -> InventoryResult<GlobalRollup> {
        let currency = self.currency_or_base(currency);
        self.aggregator.global_rollup(&currency, &self.rates_today())
    }

    pub fn value_position(
        &self,
        depot_id: DepotId,
        article_id: ArticleId,
        currency: Option<CurrencyCode>,
    ) -> InventoryResult<PositionValuation> {
        let currency = self.currency_or_base(currency);
        self.aggregator
            .value_position(PositionKey::new(depot_id, article_id), &currency, &self.rates_today())
    }

    pub fn depot_summary(&self, depot_id: DepotId, currency: Option<CurrencyCode>) -> InventoryResult<DepotSummary> {
        let currency = self.currency_or_base(currency);
        self.aggregator.depot_summary(depot_id, &currency, &self.rates_today())
    }

    /// Landed unit cost of a position's stock, in the position's currency.
    pub fn landed_cost(
        &self,
        depot_id: DepotId,
        article_id: ArticleId,
        inputs: &LandedCostInputs,
    ) -> InventoryResult<LandedCost> {
        let position = self
            .position(depot_id, article_id)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| InventoryError::Domain(DomainError::not_found(format!("stock of {article_id} at {depot_id}"))))?;
        let currency = position
            .cost_currency()
            .cloned()
            .unwrap_or_else(|| self.config.base_currency.clone());

        Ok(landed_cost(inputs, position.average_unit_cost(), &currency, &self.rates_today())?)
    }

    pub fn rates_today(&self) -> RateTable {
        self.rates.rates_for(Utc::now().date_naive())
    }

    pub fn refresh_rates(&self, date: Option<NaiveDate>) -> RateTable {
        self.rates.refresh(date.unwrap_or_else(|| Utc::now().date_naive()))
    }

    pub fn rate_source(&self) -> RateSource {
        self.rates.source()
    }

    /// Notifications for every movement applied after this call.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<MovementApplied>> {
        self.processor.bus().subscribe()
    }

    /// Logged movements after sequence `after`.
    pub fn movements_since(&self, after: u64) -> Result<Vec<StoredMovement>, ReplayError> {
        Ok(self.processor.log().read_from(after)?)
    }

    /// Rebuild the ledger from the log and compare it with the live stores.
    pub fn verify_replay(&self) -> Result<(ReplayReport, bool), ReplayError> {
        let (lots, positions, report) = replay::replay(self.processor.log())?;
        let same = replay::matches_live(self.processor.lots(), self.processor.positions(), &lots, &positions);
        Ok((report, same))
    }

    fn currency_or_base(&self, currency: Option<CurrencyCode>) -> CurrencyCode {
        currency.unwrap_or_else(|| self.config.base_currency.clone())
    }
}
