//! Article catalog and depot registry adapters.
//!
//! Master data is owned elsewhere; the ledger only reads it. This crate holds
//! the read-only lookup traits the movement processor depends on, an
//! in-memory implementation, and the kg/carton packaging conversion.

pub mod article;
pub mod depot;
pub mod directory;

pub use article::{Article, cartons_from_kg, kg_from_cartons};
pub use depot::Depot;
pub use directory::{ArticleCatalog, CatalogSeed, DepotRegistry, Directory, InMemoryCatalog};
