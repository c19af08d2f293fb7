//! Read-only master-data lookups consumed by the ledger.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::Deserialize;

use lotledger_core::{ArticleId, CurrencyCode, DepotId, DomainError, DomainResult, Entity};

use crate::article::Article;
use crate::depot::Depot;

/// Article catalog boundary: packaging factor and reference cost metadata.
pub trait ArticleCatalog: Send + Sync {
    fn get_article(&self, id: ArticleId) -> Option<Article>;
}

/// Depot registry boundary: warehouse identities.
pub trait DepotRegistry: Send + Sync {
    fn get_depot(&self, id: DepotId) -> Option<Depot>;
}

impl<S> ArticleCatalog for Arc<S>
where
    S: ArticleCatalog + ?Sized,
{
    fn get_article(&self, id: ArticleId) -> Option<Article> {
        (**self).get_article(id)
    }
}

impl<S> DepotRegistry for Arc<S>
where
    S: DepotRegistry + ?Sized,
{
    fn get_depot(&self, id: DepotId) -> Option<Depot> {
        (**self).get_depot(id)
    }
}

/// In-memory, id-keyed collection of entities.
#[derive(Debug)]
pub struct Directory<E: Entity> {
    inner: RwLock<HashMap<E::Id, E>>,
}

impl<E: Entity> Default for Directory<E> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> Directory<E>
where
    E: Entity + Clone,
    E::Id: Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity by id.
    pub fn put(&self, entity: E) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(entity.id().clone(), entity);
        }
    }

    pub fn get(&self, id: &E::Id) -> Option<E> {
        self.inner.read().ok()?.get(id).cloned()
    }

    pub fn list(&self) -> Vec<E> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }

    /// Apply `f` to the stored entity, if present.
    pub fn update<R>(&self, id: &E::Id, f: impl FnOnce(&mut E) -> DomainResult<R>) -> DomainResult<R> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::conflict("directory lock poisoned"))?;
        let entity = map
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("{id:?}")))?;
        f(entity)
    }
}

/// Articles and depots held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    articles: Directory<Article>,
    depots: Directory<Depot>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a seed document, validating every record.
    pub fn from_seed(seed: CatalogSeed) -> DomainResult<Self> {
        let catalog = Self::new();
        for a in seed.articles {
            let currency = CurrencyCode::new(&a.reference_cost_currency)?;
            catalog.register_article(Article::new(
                a.id,
                a.reference,
                a.packaging_kg_per_carton,
                a.reference_cost,
                currency,
            )?);
        }
        for d in seed.depots {
            catalog.register_depot(Depot::new(d.id, d.code, d.name)?);
        }
        Ok(catalog)
    }

    /// Parse a JSON seed (`{"articles": [...], "depots": [...]}`).
    pub fn from_json(json: &str) -> DomainResult<Self> {
        let seed: CatalogSeed = serde_json::from_str(json)
            .map_err(|e| DomainError::validation(format!("invalid catalog seed: {e}")))?;
        Self::from_seed(seed)
    }

    pub fn register_article(&self, article: Article) {
        self.articles.put(article);
    }

    pub fn register_depot(&self, depot: Depot) {
        self.depots.put(depot);
    }

    pub fn correct_packaging(&self, id: ArticleId, packaging_kg_per_carton: Decimal) -> DomainResult<()> {
        self.articles
            .update(&id, |article| article.correct_packaging(packaging_kg_per_carton))
    }

    pub fn articles(&self) -> Vec<Article> {
        self.articles.list()
    }

    pub fn depots(&self) -> Vec<Depot> {
        self.depots.list()
    }
}

impl ArticleCatalog for InMemoryCatalog {
    fn get_article(&self, id: ArticleId) -> Option<Article> {
        self.articles.get(&id)
    }
}

impl DepotRegistry for InMemoryCatalog {
    fn get_depot(&self, id: DepotId) -> Option<Depot> {
        self.depots.get(&id)
    }
}

/// Serialized master data used to seed an [`InMemoryCatalog`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub articles: Vec<ArticleSeed>,
    #[serde(default)]
    pub depots: Vec<DepotSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArticleSeed {
    pub id: ArticleId,
    pub reference: String,
    pub packaging_kg_per_carton: Decimal,
    pub reference_cost: Decimal,
    pub reference_cost_currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepotSeed {
    pub id: DepotId,
    pub code: String,
    #[serde(default)]
    pub name: String,
}
