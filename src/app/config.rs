//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides for deployment selection and credentials. Everything is read
//! once at startup and immutable thereafter.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::core::exchange::rate_limit::Tier;
use crate::core::liquidity::LiquidityConfig;
use crate::core::scanner::ScannerConfig;
use crate::error::{ConfigError, Result};

/// Deployment environment; selects the API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Demo,
    Prod,
}

impl Environment {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "demo" => Ok(Self::Demo),
            "prod" => Ok(Self::Prod),
            _ => Err(ConfigError::InvalidValue {
                field: "ENVIRONMENT",
                value: s.to_string(),
            }
            .into()),
        }
    }

    #[must_use]
    pub const fn base_url(&self) -> &'static str {
        match self {
            Self::Demo => "https://demo-api.kalshi.co/trade-api/v2",
            Self::Prod => "https://api.elections.kalshi.com/trade-api/v2",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        match self.format.as_str() {
            "json" => {
                tracing_subscriber::fmt().json().with_env_filter(filter).init();
            }
            _ => {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
        }
    }
}

/// Ingestion scheduler settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_period_secs() -> u64 {
    300
}
fn default_max_pages() -> u32 {
    50
}
fn default_failure_threshold() -> u32 {
    5
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            max_pages: default_max_pages(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

/// Agent pipeline settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_budget_usd")]
    pub budget_usd: Decimal,
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Disposable cache for research responses.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

fn default_budget_usd() -> Decimal {
    Decimal::new(50, 2)
}
fn default_mode() -> String {
    "standard".into()
}
fn default_cache_dir() -> String {
    dirs::cache_dir()
        .map(|p| p.join("edgewatch").display().to_string())
        .unwrap_or_else(|| ".edgewatch-cache".into())
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            budget_usd: default_budget_usd(),
            mode: default_mode(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default = "default_database_path")]
    pub database: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub liquidity: LiquidityConfig,
    #[serde(default)]
    pub agent: AgentSettings,
}

fn default_database_path() -> String {
    "edgewatch.db".to_string()
}

impl Config {
    /// Load from a TOML file, then apply environment overrides. A missing
    /// file yields defaults; `ENVIRONMENT` always wins when set.
    pub fn load(path: &str) -> Result<Self> {
        let raw = if Path::new(path).exists() {
            std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?
        } else {
            String::new()
        };
        let mut config: Self = toml::from_str(&raw).map_err(ConfigError::ParseToml)?;

        if let Ok(env) = std::env::var("ENVIRONMENT") {
            config.environment = Environment::parse(&env)?;
        }
        Ok(config)
    }

    #[must_use]
    pub fn base_url(&self) -> &'static str {
        self.environment.base_url()
    }
}

/// Authenticated-API credentials resolved from the environment.
pub struct Credentials {
    pub key_id: String,
    pub signer: crate::core::exchange::kalshi::RequestSigner,
}

impl Credentials {
    /// `KEY_ID` plus one of `PRIVATE_KEY_PATH` / `PRIVATE_KEY_B64`.
    /// Returns `Ok(None)` when no credentials are configured.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(key_id) = std::env::var("KEY_ID") else {
            return Ok(None);
        };

        let signer = if let Ok(path) = std::env::var("PRIVATE_KEY_PATH") {
            crate::core::exchange::kalshi::RequestSigner::from_pem_file(&key_id, &path)?
        } else if let Ok(b64) = std::env::var("PRIVATE_KEY_B64") {
            crate::core::exchange::kalshi::RequestSigner::from_base64(&key_id, &b64)?
        } else {
            return Err(ConfigError::MissingField {
                field: "PRIVATE_KEY_PATH or PRIVATE_KEY_B64",
            }
            .into());
        };

        Ok(Some(Self { key_id, signer }))
    }
}
