//! Edgewatch - Prediction market research and decision support.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── core/             # Reusable library components
//! │   ├── domain/       # Pure domain types
//! │   ├── exchange/     # Signed HTTP client + rate limiting + wire models
//! │   ├── db/           # Diesel schema, models, migrations
//! │   ├── store/        # Repositories over the embedded store
//! │   ├── ingest/       # Drift-corrected snapshot scheduler
//! │   ├── liquidity/    # Depth, slippage, composite grade
//! │   ├── scanner/      # Opportunity / movers / arbitrage scans
//! │   ├── portfolio/    # FIFO lot reconciliation and P&L
//! │   ├── agent/        # Research -> synthesize -> verify pipeline
//! │   └── service/      # Cross-cutting services (alerts, notifier, resolution)
//! └── app/              # Application configuration and wiring
//! ```
//!
//! # Features
//!
//! - `testkit` - Expose scripted test doubles to integration tests
//! - `integration-tests` - Enable tests that hit the real API (`RUN_LIVE_API=1`)

pub mod app;
pub mod cli;
pub mod core;
pub mod error;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
