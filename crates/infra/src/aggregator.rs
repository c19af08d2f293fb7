//! Stock Aggregator: read-only reporting views over positions and lots.
//!
//! Reads copy positions out of the store one at a time and never hold a
//! lock across keys; a view may therefore mix positions from before and
//! after a concurrent movement, but every position in it is consistent.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotledger_catalog::{ArticleCatalog, DepotRegistry};
use lotledger_core::{AggregateRoot, ArticleId, CurrencyCode, DepotId};
use lotledger_inventory::{InventoryError, InventoryResult, Lot, PositionKey, StockPosition, checked_total};
use lotledger_valuation::{RateTable, ValuedQuantity, value_in, weighted_mean};

use crate::lot_ledger::LotLedger;
use crate::position_store::PositionStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionFilter {
    #[serde(default)]
    pub depot_id: Option<DepotId>,
    #[serde(default)]
    pub article_id: Option<ArticleId>,
    /// Also return positions whose stock has been fully drawn.
    #[serde(default)]
    pub include_empty: bool,
}

impl PositionFilter {
    pub fn depot(depot_id: DepotId) -> Self {
        Self {
            depot_id: Some(depot_id),
            ..Self::default()
        }
    }

    pub fn article(article_id: ArticleId) -> Self {
        Self {
            article_id: Some(article_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, position: &StockPosition) -> bool {
        self.depot_id.is_none_or(|d| d == position.depot_id())
            && self.article_id.is_none_or(|a| a == position.article_id())
            && (self.include_empty || !position.is_empty())
    }
}

/// Disponible (total) and commercialisable stock side by side, with carton equivalents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionView {
    pub depot_id: DepotId,
    pub depot_code: Option<String>,
    pub article_id: ArticleId,
    pub article_reference: Option<String>,
    pub disponible_kg: Decimal,
    pub commercialisable_kg: Decimal,
    pub quarantined_kg: Decimal,
    pub disponible_cartons: Option<Decimal>,
    pub commercialisable_cartons: Option<Decimal>,
    pub average_unit_cost: Decimal,
    pub cost_currency: Option<CurrencyCode>,
    pub inventory_value: Decimal,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRollup {
    pub article_id: ArticleId,
    pub currency: CurrencyCode,
    /// Depots holding stock of the article.
    pub depots: usize,
    pub total_quantity_kg: Decimal,
    pub total_commercialisable_kg: Decimal,
    /// `None` when no depot holds stock.
    pub weighted_average_cost: Option<Decimal>,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalRollup {
    pub currency: CurrencyCode,
    pub articles: Vec<ArticleRollup>,
    pub total_quantity_kg: Decimal,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionValuation {
    pub depot_id: DepotId,
    pub article_id: ArticleId,
    pub currency: CurrencyCode,
    pub quantity_kg: Decimal,
    /// Lots with stock left that contributed.
    pub lots: usize,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepotSummary {
    pub depot_id: DepotId,
    pub currency: CurrencyCode,
    pub positions: usize,
    pub total_quantity_kg: Decimal,
    pub total_commercialisable_kg: Decimal,
    pub total_value: Decimal,
}

pub struct StockAggregator<L, P> {
    lots: L,
    positions: P,
    articles: Arc<dyn ArticleCatalog>,
    depots: Arc<dyn DepotRegistry>,
}

impl<L, P> StockAggregator<L, P>
where
    L: LotLedger,
    P: PositionStore,
{
    pub fn new<C>(lots: L, positions: P, catalog: Arc<C>) -> Self
    where
        C: ArticleCatalog + DepotRegistry + 'static,
    {
        let articles: Arc<dyn ArticleCatalog> = catalog.clone();
        let depots: Arc<dyn DepotRegistry> = catalog;
        Self {
            lots,
            positions,
            articles,
            depots,
        }
    }

    pub fn query_positions(&self, filter: &PositionFilter) -> Vec<StockPosition> {
        self.positions
            .list()
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect()
    }

    pub fn position_views(&self, filter: &PositionFilter) -> Vec<PositionView> {
        self.query_positions(filter)
            .into_iter()
            .map(|p| self.view(p))
            .collect()
    }

    /// Lots of the pair with stock left, oldest first.
    pub fn query_available_lots(&self, article_id: ArticleId, depot_id: DepotId) -> Vec<Lot> {
        self.lots.list_available(article_id, depot_id)
    }

    /// Cross-depot rollup of one article, converted into `currency`.
    pub fn article_rollup(
        &self,
        article_id: ArticleId,
        currency: &CurrencyCode,
        rates: &RateTable,
    ) -> InventoryResult<ArticleRollup> {
        let positions = self.query_positions(&PositionFilter::article(article_id));
        rollup(article_id, &positions, currency, rates)
    }

    /// One rollup per article with stock, plus grand totals.
    pub fn global_rollup(&self, currency: &CurrencyCode, rates: &RateTable) -> InventoryResult<GlobalRollup> {
        let mut by_article: BTreeMap<ArticleId, Vec<StockPosition>> = BTreeMap::new();
        for position in self.query_positions(&PositionFilter::default()) {
            by_article.entry(position.article_id()).or_default().push(position);
        }

        let articles = by_article
            .iter()
            .map(|(article_id, positions)| rollup(*article_id, positions, currency, rates))
            .collect::<InventoryResult<Vec<_>>>()?;

        Ok(GlobalRollup {
            currency: currency.clone(),
            total_quantity_kg: checked_total(articles.iter().map(|a| a.total_quantity_kg))?,
            total_value: checked_total(articles.iter().map(|a| a.total_value))?,
            articles,
        })
    }

    /// Value of a position in `currency`, summed lot by lot at each lot's own cost.
    pub fn value_position(
        &self,
        key: PositionKey,
        currency: &CurrencyCode,
        rates: &RateTable,
    ) -> InventoryResult<PositionValuation> {
        let remainders: Vec<ValuedQuantity> = self
            .lots
            .lots_at(key)
            .iter()
            .filter(|lot| lot.is_available())
            .map(Lot::valued_remainder)
            .collect();

        Ok(PositionValuation {
            depot_id: key.depot_id,
            article_id: key.article_id,
            currency: currency.clone(),
            quantity_kg: checked_total(remainders.iter().map(|r| r.quantity_kg))?,
            lots: remainders.len(),
            value: value_in(remainders.iter(), currency, rates)?,
        })
    }

    pub fn depot_summary(
        &self,
        depot_id: DepotId,
        currency: &CurrencyCode,
        rates: &RateTable,
    ) -> InventoryResult<DepotSummary> {
        let positions = self.query_positions(&PositionFilter::depot(depot_id));

        let total_value = checked_total(
            positions
                .iter()
                .map(|p| converted_value(p, currency, rates))
                .collect::<InventoryResult<Vec<_>>>()?,
        )?;

        Ok(DepotSummary {
            depot_id,
            currency: currency.clone(),
            positions: positions.len(),
            total_quantity_kg: checked_total(positions.iter().map(StockPosition::quantity_kg))?,
            total_commercialisable_kg: checked_total(positions.iter().map(StockPosition::quantity_commercialisable_kg))?,
            total_value,
        })
    }

    fn view(&self, position: StockPosition) -> PositionView {
        let article = self.articles.get_article(position.article_id());
        let cartons = |kg: Decimal| article.as_ref().and_then(|a| a.cartons_from_kg(kg).ok());

        PositionView {
            depot_id: position.depot_id(),
            depot_code: self
                .depots
                .get_depot(position.depot_id())
                .map(|d| d.code().to_string()),
            article_id: position.article_id(),
            article_reference: article.as_ref().map(|a| a.reference().to_string()),
            disponible_kg: position.quantity_kg(),
            commercialisable_kg: position.quantity_commercialisable_kg(),
            quarantined_kg: position.quantity_quarantined_kg(),
            disponible_cartons: cartons(position.quantity_kg()),
            commercialisable_cartons: cartons(position.quantity_commercialisable_kg()),
            average_unit_cost: position.average_unit_cost(),
            cost_currency: position.cost_currency().cloned(),
            inventory_value: position.inventory_value(),
            version: position.version(),
        }
    }
}

/// `Σ(qty_i * avg_i * fx_i) / Σ qty_i` over the positions holding stock.
fn rollup(
    article_id: ArticleId,
    positions: &[StockPosition],
    currency: &CurrencyCode,
    rates: &RateTable,
) -> InventoryResult<ArticleRollup> {
    let overflow = || InventoryError::overflow("total_value");
    let mut weighted = Vec::with_capacity(positions.len());
    let mut total_value = Decimal::ZERO;

    for position in positions.iter().filter(|p| !p.is_empty()) {
        let factor = fx_factor(position, currency, rates)?;
        let average = position.average_unit_cost().checked_mul(factor).ok_or_else(overflow)?;
        weighted.push((position.quantity_kg(), average));
        total_value = total_value
            .checked_add(converted_value(position, currency, rates)?)
            .ok_or_else(overflow)?;
    }

    Ok(ArticleRollup {
        article_id,
        currency: currency.clone(),
        depots: weighted.len(),
        total_quantity_kg: checked_total(weighted.iter().map(|(qty, _)| *qty))?,
        total_commercialisable_kg: checked_total(positions.iter().map(StockPosition::quantity_commercialisable_kg))?,
        weighted_average_cost: weighted_mean(weighted),
        total_value,
    })
}

fn fx_factor(position: &StockPosition, currency: &CurrencyCode, rates: &RateTable) -> InventoryResult<Decimal> {
    match position.cost_currency() {
        Some(from) => Ok(rates.factor(from, currency)?),
        None => Ok(Decimal::ONE),
    }
}

fn converted_value(position: &StockPosition, currency: &CurrencyCode, rates: &RateTable) -> InventoryResult<Decimal> {
    position
        .inventory_value()
        .checked_mul(fx_factor(position, currency, rates)?)
        .ok_or_else(|| InventoryError::overflow("inventory_value"))
}
