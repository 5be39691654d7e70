//! Ingestion scheduler: a drift-corrected periodic loop that discovers
//! markets, snapshots prices, and syncs the authenticated portfolio streams
//! into the store.

mod pipeline;
mod ticks;

pub use pipeline::{IngestPipeline, IngestStores};
pub use ticks::next_tick;

use std::time::Duration;

use serde::Deserialize;

/// One unit of ingestion work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IngestStage {
    /// Paginated event + market discovery.
    SyncMarkets,
    /// Current prices for open markets.
    Snapshot,
    SyncSettlements,
    SyncFills,
}

impl IngestStage {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sync-markets" => Some(Self::SyncMarkets),
            "snapshot" => Some(Self::Snapshot),
            "sync-settlements" => Some(Self::SyncSettlements),
            "sync-fills" => Some(Self::SyncFills),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SyncMarkets => "sync-markets",
            Self::Snapshot => "snapshot",
            Self::SyncSettlements => "sync-settlements",
            Self::SyncFills => "sync-fills",
        }
    }
}

/// Single pass or periodic loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Continuous,
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub period: Duration,
    pub stages: Vec<IngestStage>,
    /// Safety cap on pages per paginated fetch.
    pub max_pages: Option<u32>,
    /// Consecutive failing ticks before the scheduler exits non-zero.
    pub failure_threshold: u32,
    pub page_limit: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(300),
            stages: vec![
                IngestStage::SyncMarkets,
                IngestStage::Snapshot,
                IngestStage::SyncSettlements,
                IngestStage::SyncFills,
            ],
            max_pages: Some(50),
            failure_threshold: 5,
            page_limit: 200,
        }
    }
}
