//! HTTP API: routing and request/response mapping over the ledger engine.

pub mod app;
