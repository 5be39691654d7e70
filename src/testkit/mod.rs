//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`] — Builders for domain primitives: markets, books, fills.
//! - [`api`] — A scripted [`MarketApi`](crate::core::exchange::MarketApi)
//!   double backed by in-memory pages.
//! - [`research`] — Scripted research provider and failing synthesizer
//!   doubles for orchestrator tests.

pub mod api;
pub mod domain;
pub mod research;

pub use api::{numbered_pages, ScriptedMarketApi};
pub use domain::{book, fill_at, market, memory_pool, prediction, snapshot, snapshot_at};
pub use research::{CountingSynthesizer, ScriptedResearchProvider};
