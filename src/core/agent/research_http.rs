//! HTTP research provider adapter with a disposable response cache.
//!
//! Speaks an Exa-style JSON API. Responses for idempotent operations are
//! cached on disk keyed by a digest of the request, so repeated analysis of
//! the same market does not re-spend the research budget. The cache
//! directory is disposable; deleting it only costs money, not correctness.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::research::{
    AnswerResponse, ContentsOptions, ContentsResponse, Document, ResearchProvider,
    ResearchTaskPoll, ResearchTaskStatus, SearchOptions, SearchResponse, SearchResultItem,
};
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.exa.ai";

/// HTTP-backed research provider.
pub struct HttpResearchProvider {
    http: HttpClient,
    base_url: String,
    api_key: String,
    cache_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct WireCost {
    #[serde(default)]
    total: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireSearchResponse {
    #[serde(default)]
    results: Vec<SearchResultItem>,
    #[serde(rename = "costDollars", default)]
    cost_dollars: Option<WireCost>,
}

#[derive(Debug, Deserialize)]
struct WireContentsResponse {
    #[serde(default)]
    results: Vec<Document>,
    #[serde(rename = "costDollars", default)]
    cost_dollars: Option<WireCost>,
}

#[derive(Debug, Deserialize)]
struct WireAnswerResponse {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    citations: Vec<SearchResultItem>,
    #[serde(rename = "costDollars", default)]
    cost_dollars: Option<WireCost>,
}

#[derive(Debug, Deserialize)]
struct WireTaskCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireTaskPoll {
    status: ResearchTaskStatus,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    citations: Vec<SearchResultItem>,
    #[serde(rename = "costDollars", default)]
    cost_dollars: Option<WireCost>,
}

fn cost_to_decimal(cost: Option<WireCost>) -> Decimal {
    cost.and_then(|c| c.total)
        .and_then(|t| Decimal::try_from(t).ok())
        .unwrap_or(Decimal::ZERO)
}

impl HttpResearchProvider {
    pub fn new(api_key: impl Into<String>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            cache_dir,
        }
    }

    /// Build from `RESEARCH_API_KEY`.
    pub fn from_env(cache_dir: Option<PathBuf>) -> Result<Self> {
        let api_key = std::env::var("RESEARCH_API_KEY").map_err(|_| {
            Error::Config(crate::error::ConfigError::MissingField {
                field: "RESEARCH_API_KEY",
            })
        })?;
        Ok(Self::new(api_key, cache_dir))
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn cache_path(&self, endpoint: &str, body: &serde_json::Value) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        let mut hasher = Sha256::new();
        hasher.update(endpoint.as_bytes());
        hasher.update(body.to_string().as_bytes());
        Some(dir.join(format!("{}.json", hex::encode(hasher.finalize()))))
    }

    fn cache_read(&self, path: &Option<PathBuf>) -> Option<String> {
        let path = path.as_ref()?;
        std::fs::read_to_string(path).ok()
    }

    fn cache_write(&self, path: &Option<PathBuf>, payload: &str) {
        if let Some(path) = path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(path, payload) {
                warn!(path = %path.display(), error = %e, "research cache write failed");
            }
        }
    }

    /// POST, consulting the cache when `cacheable`.
    async fn post(
        &self,
        endpoint: &str,
        body: serde_json::Value,
        cacheable: bool,
    ) -> Result<String> {
        let cache_path = cacheable.then(|| self.cache_path(endpoint, &body)).flatten();
        if let Some(hit) = self.cache_read(&cache_path) {
            debug!(endpoint, "research cache hit");
            return Ok(hit);
        }

        let response = self
            .http
            .post(format!("{}{}", self.base_url, endpoint))
            .header("x-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        self.cache_write(&cache_path, &text);
        Ok(text)
    }

    async fn get(&self, endpoint: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, endpoint))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl ResearchProvider for HttpResearchProvider {
    async fn search(&self, query: &str, opts: &SearchOptions) -> Result<SearchResponse> {
        let mut body = serde_json::to_value(opts)?;
        body["query"] = serde_json::Value::String(query.to_string());
        let text = self.post("/search", body, true).await?;
        let wire: WireSearchResponse = serde_json::from_str(&text)?;
        Ok(SearchResponse {
            results: wire.results,
            cost_dollars: cost_to_decimal(wire.cost_dollars),
        })
    }

    async fn get_contents(
        &self,
        urls: &[String],
        opts: &ContentsOptions,
    ) -> Result<ContentsResponse> {
        let mut body = serde_json::to_value(opts)?;
        body["urls"] = serde_json::json!(urls);
        let text = self.post("/contents", body, true).await?;
        let wire: WireContentsResponse = serde_json::from_str(&text)?;
        Ok(ContentsResponse {
            documents: wire.results,
            cost_dollars: cost_to_decimal(wire.cost_dollars),
        })
    }

    async fn find_similar(&self, url: &str, opts: &SearchOptions) -> Result<SearchResponse> {
        let mut body = serde_json::to_value(opts)?;
        body["url"] = serde_json::Value::String(url.to_string());
        let text = self.post("/findSimilar", body, true).await?;
        let wire: WireSearchResponse = serde_json::from_str(&text)?;
        Ok(SearchResponse {
            results: wire.results,
            cost_dollars: cost_to_decimal(wire.cost_dollars),
        })
    }

    async fn answer(&self, question: &str) -> Result<AnswerResponse> {
        let body = serde_json::json!({ "query": question });
        let text = self.post("/answer", body, true).await?;
        let wire: WireAnswerResponse = serde_json::from_str(&text)?;
        Ok(AnswerResponse {
            answer: wire.answer,
            citations: wire.citations.into_iter().map(|c| c.url).collect(),
            cost_dollars: cost_to_decimal(wire.cost_dollars),
        })
    }

    async fn start_research_task(
        &self,
        instructions: &str,
        model: &str,
        output_schema: Option<serde_json::Value>,
    ) -> Result<String> {
        let mut body = serde_json::json!({
            "instructions": instructions,
            "model": model,
        });
        if let Some(schema) = output_schema {
            body["outputSchema"] = schema;
        }
        // Task creation is never cached; each run is a fresh task.
        let text = self.post("/research/v1", body, false).await?;
        let wire: WireTaskCreated = serde_json::from_str(&text)?;
        Ok(wire.id)
    }

    async fn poll_research_task(&self, task_id: &str) -> Result<ResearchTaskPoll> {
        let text = self.get(&format!("/research/v1/{task_id}")).await?;
        let wire: WireTaskPoll = serde_json::from_str(&text)?;
        Ok(ResearchTaskPoll {
            status: wire.status,
            output: wire.output.map(|v| v.to_string()),
            citations: wire.citations.into_iter().map(|c| c.url).collect(),
            cost_dollars: cost_to_decimal(wire.cost_dollars),
        })
    }
}
