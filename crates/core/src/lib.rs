//! `lotledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog,
//! valuation and inventory crates (no infrastructure concerns).

pub mod aggregate;
pub mod currency;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use currency::CurrencyCode;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ArticleId, DepotId, LotId, MovementId};
pub use value_object::ValueObject;
