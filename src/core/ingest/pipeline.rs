//! The ingestion pipeline executed on each scheduler tick.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::{next_tick, IngestConfig, IngestStage, RunMode};
use crate::core::domain::PriceSnapshot;
use crate::core::exchange::{MarketApi, MarketFilter};
use crate::core::service::ShutdownSignal;
use crate::core::store::{
    FillStore, MarketStore, PredictionStore, SettlementStore, SnapshotStore, ThesisStore,
};
use crate::error::{Error, Result};

/// The repositories a pipeline writes to.
pub struct IngestStores {
    pub markets: Arc<MarketStore>,
    pub snapshots: Arc<SnapshotStore>,
    pub settlements: Arc<SettlementStore>,
    pub fills: Arc<FillStore>,
    pub predictions: Arc<PredictionStore>,
    pub theses: Arc<ThesisStore>,
}

/// Drift-corrected ingestion loop. The pipeline is the single store writer;
/// stages run sequentially within a tick and batches commit page by page, so
/// a mid-stream failure keeps everything already written.
pub struct IngestPipeline {
    api: Arc<dyn MarketApi>,
    stores: IngestStores,
    config: IngestConfig,
    shutdown: ShutdownSignal,
}

impl IngestPipeline {
    pub fn new(
        api: Arc<dyn MarketApi>,
        stores: IngestStores,
        config: IngestConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            api,
            stores,
            config,
            shutdown,
        }
    }

    /// Run once or forever, depending on mode.
    pub async fn run(&self, mode: RunMode) -> Result<()> {
        match mode {
            RunMode::Once => self.run_tick().await,
            RunMode::Continuous => self.run_continuous().await,
        }
    }

    async fn run_continuous(&self) -> Result<()> {
        let start = Instant::now();
        let mut consecutive_failures = 0u32;
        let mut shutdown = self.shutdown.clone();

        loop {
            match self.run_tick().await {
                Ok(()) => consecutive_failures = 0,
                Err(Error::Cancelled) => return Ok(()),
                Err(e) => {
                    consecutive_failures += 1;
                    error!(
                        error = %e,
                        consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "ingestion tick failed"
                    );
                    if consecutive_failures >= self.config.failure_threshold {
                        return Err(e);
                    }
                }
            }

            let wake_at = next_tick(start, self.config.period, Instant::now());
            tokio::select! {
                () = tokio::time::sleep_until(wake_at) => {}
                () = shutdown.cancelled() => return Ok(()),
            }
        }
    }

    /// Execute every configured stage once.
    pub async fn run_tick(&self) -> Result<()> {
        for stage in &self.config.stages {
            if self.shutdown.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let started = Instant::now();
            match stage {
                IngestStage::SyncMarkets => self.sync_markets().await?,
                IngestStage::Snapshot => self.snapshot().await?,
                IngestStage::SyncSettlements => self.sync_settlements().await?,
                IngestStage::SyncFills => self.sync_fills().await?,
            }
            info!(
                stage = stage.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stage complete"
            );
        }
        Ok(())
    }

    /// Walk a paginated stream, persisting each page as it lands. On failure
    /// the committed pages stay and the last cursor is logged.
    async fn drain_pages<T, FetchFut, Persist>(
        &self,
        op: &'static str,
        mut fetch: impl FnMut(Option<String>) -> FetchFut,
        mut persist: Persist,
    ) -> Result<usize>
    where
        FetchFut: std::future::Future<Output = Result<crate::core::exchange::paging::Page<T>>>,
        Persist: FnMut(Vec<T>) -> Result<usize>,
    {
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;
        let mut written = 0usize;

        loop {
            if self.shutdown.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let Some(cap) = self.config.max_pages {
                if pages >= cap {
                    if let Some(ref last) = cursor {
                        warn!(op, max_pages = cap, cursor = last.as_str(), "page cap reached");
                    }
                    return Ok(written);
                }
            }

            let page = match fetch(cursor.clone()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        op,
                        last_cursor = cursor.as_deref().unwrap_or(""),
                        pages_persisted = pages,
                        error = %e,
                        "paginated fetch failed mid-stream"
                    );
                    return Err(e);
                }
            };
            pages += 1;
            written += persist(page.items)?;

            match page.cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(written),
            }
        }
    }

    /// Discover events, then markets, upserting page by page.
    async fn sync_markets(&self) -> Result<()> {
        let events = self
            .drain_pages(
                "sync_events",
                |cursor| self.api.events_page(cursor, self.config.page_limit),
                |batch| self.stores.markets.upsert_events(&batch),
            )
            .await?;

        let filter = MarketFilter::default();
        let markets = self
            .drain_pages(
                "sync_markets",
                |cursor| self.api.markets_page(&filter, cursor, 1000),
                |batch| self.stores.markets.upsert_markets(&batch),
            )
            .await?;

        info!(events, markets, "market discovery synced");
        Ok(())
    }

    /// Snapshot current prices for open markets.
    async fn snapshot(&self) -> Result<()> {
        let now = Utc::now();
        let filter = MarketFilter::open();
        let written = self
            .drain_pages(
                "snapshot",
                |cursor| self.api.markets_page(&filter, cursor, 1000),
                |batch| {
                    // Keep the market rows fresh too; the scanner reads them.
                    self.stores.markets.upsert_markets(&batch)?;
                    let snapshots: Vec<PriceSnapshot> = batch
                        .into_iter()
                        .map(|m| PriceSnapshot {
                            ticker: m.ticker.clone(),
                            snapshot_ts: now,
                            yes_bid: m.yes_bid,
                            yes_ask: m.yes_ask,
                            volume: m.volume,
                            open_interest: m.open_interest,
                            liquidity: m.liquidity,
                        })
                        .collect();
                    self.stores.snapshots.upsert_batch(&snapshots)
                },
            )
            .await?;
        info!(written, "price snapshots recorded");
        Ok(())
    }

    async fn sync_settlements(&self) -> Result<()> {
        let written = self
            .drain_pages(
                "sync_settlements",
                |cursor| self.api.settlements_page(cursor, self.config.page_limit),
                |batch| self.stores.settlements.upsert_batch(&batch),
            )
            .await?;

        // Settlements unlock prediction and thesis resolution.
        let resolved = crate::core::service::resolution::resolve_settled(
            &self.stores.predictions,
            &self.stores.theses,
            &self.stores.settlements,
        )?;
        info!(written, resolved, "settlements synced");
        Ok(())
    }

    async fn sync_fills(&self) -> Result<()> {
        let written = self
            .drain_pages(
                "sync_fills",
                |cursor| self.api.fills_page(cursor, self.config.page_limit),
                |batch| self.stores.fills.upsert_batch(&batch),
            )
            .await?;
        info!(written, "fills synced");
        Ok(())
    }
}
