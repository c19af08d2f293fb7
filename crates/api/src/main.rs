use std::sync::Arc;

use anyhow::Context;
use lotledger_catalog::InMemoryCatalog;
use lotledger_infra::{EngineConfig, InventoryEngine};
use lotledger_observability::ObservabilityConfig;
use lotledger_valuation::StaticRateProvider;

const BIND_ADDR_VAR: &str = "LOTLEDGER_BIND_ADDR";
const CATALOG_PATH_VAR: &str = "LOTLEDGER_CATALOG_PATH";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

fn load_catalog() -> anyhow::Result<InMemoryCatalog> {
    let Ok(path) = std::env::var(CATALOG_PATH_VAR) else {
        tracing::warn!("{CATALOG_PATH_VAR} not set; starting with an empty catalog");
        return Ok(InMemoryCatalog::new());
    };

    let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read catalog seed {path}"))?;
    let catalog = InMemoryCatalog::from_json(&json).with_context(|| format!("invalid catalog seed {path}"))?;
    tracing::info!(
        path = %path,
        articles = catalog.articles().len(),
        depots = catalog.depots().len(),
        "catalog loaded"
    );
    Ok(catalog)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lotledger_observability::init(&ObservabilityConfig::from_env());

    let config = EngineConfig::from_env();
    let catalog = load_catalog()?;
    // No live rate feed is wired in; the configured fallback table stands in for it.
    let rates = Arc::new(StaticRateProvider::new(config.fallback_rates.clone()));
    let engine = Arc::new(InventoryEngine::new(config, Arc::new(catalog), rates));

    let app = lotledger_api::app::build_app(engine);

    let addr = std::env::var(BIND_ADDR_VAR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
