//! Application wiring.
//!
//! [`App::bootstrap`] builds the process-wide shared pieces once (pool,
//! rate limiter, signed client, repositories) and hands them out as `Arc`s.
//! The rate limiter and the store writer are the only process-wide mutables,
//! constructed here and passed as dependencies.

mod config;

pub use config::{AgentSettings, Config, Credentials, Environment, IngestSettings, LoggingConfig};

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::core::agent::synthesizer::{MockSynthesizer, Synthesizer, SynthesizerBackend};
use crate::core::agent::synth_http::ChatSynthesizer;
use crate::core::db::{self, DbPool};
use crate::core::exchange::kalshi::KalshiClient;
use crate::core::exchange::rate_limit::RateLimiter;
use crate::core::exchange::MarketApi;
use crate::core::ingest::{IngestConfig, IngestStores};
use crate::core::service::ShutdownSignal;
use crate::core::store::{
    AlertStore, FillStore, MarketStore, PredictionStore, SettlementStore, SnapshotStore,
    ThesisStore,
};
use crate::error::Result;

/// Shared application state.
pub struct App {
    pub config: Config,
    pub pool: DbPool,
    pub limiter: Arc<RateLimiter>,
    pub api: Arc<dyn MarketApi>,
    pub markets: Arc<MarketStore>,
    pub snapshots: Arc<SnapshotStore>,
    pub settlements: Arc<SettlementStore>,
    pub fills: Arc<FillStore>,
    pub theses: Arc<ThesisStore>,
    pub predictions: Arc<PredictionStore>,
    pub alerts: Arc<AlertStore>,
    pub authenticated: bool,
}

impl App {
    /// Build the application. Fails with `SchemaMismatch` when migrations
    /// are pending; run `edgewatch db migrate` first.
    pub fn bootstrap(config: Config, shutdown: ShutdownSignal) -> Result<Self> {
        let pool = db::create_pool(&config.database)?;
        db::ensure_schema(&pool)?;

        let limiter = Arc::new(RateLimiter::new(config.tier));
        let mut client = KalshiClient::new(config.base_url(), limiter.clone(), shutdown)?;

        let credentials = Credentials::from_env()?;
        let authenticated = credentials.is_some();
        if let Some(credentials) = credentials {
            info!(key_id = credentials.key_id.as_str(), "authenticated client enabled");
            client = client.with_signer(Arc::new(credentials.signer));
        }

        Ok(Self {
            limiter,
            api: Arc::new(client),
            markets: Arc::new(MarketStore::new(pool.clone())),
            snapshots: Arc::new(SnapshotStore::new(pool.clone())),
            settlements: Arc::new(SettlementStore::new(pool.clone())),
            fills: Arc::new(FillStore::new(pool.clone())),
            theses: Arc::new(ThesisStore::new(pool.clone())),
            predictions: Arc::new(PredictionStore::new(pool.clone())),
            alerts: Arc::new(AlertStore::new(pool.clone())),
            pool,
            config,
            authenticated,
        })
    }

    /// Stores bundle for the ingestion pipeline.
    #[must_use]
    pub fn ingest_stores(&self) -> IngestStores {
        IngestStores {
            markets: self.markets.clone(),
            snapshots: self.snapshots.clone(),
            settlements: self.settlements.clone(),
            fills: self.fills.clone(),
            predictions: self.predictions.clone(),
            theses: self.theses.clone(),
        }
    }

    /// Scheduler configuration derived from settings.
    #[must_use]
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            period: Duration::from_secs(self.config.ingest.period_secs),
            max_pages: Some(self.config.ingest.max_pages),
            failure_threshold: self.config.ingest.failure_threshold,
            ..IngestConfig::default()
        }
    }

    /// Build the synthesizer selected by `SYNTHESIZER_BACKEND`.
    pub fn build_synthesizer(&self) -> Result<Arc<dyn Synthesizer>> {
        Ok(match SynthesizerBackend::from_env()? {
            SynthesizerBackend::Mock => Arc::new(MockSynthesizer),
            SynthesizerBackend::ProviderA => {
                Arc::new(ChatSynthesizer::provider_a_from_env("claude-sonnet-4-20250514")?)
            }
            SynthesizerBackend::ProviderB => {
                Arc::new(ChatSynthesizer::provider_b_from_env("gpt-4o-mini")?)
            }
            SynthesizerBackend::Local => Arc::new(ChatSynthesizer::local("local-model")),
        })
    }
}
