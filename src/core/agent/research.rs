//! The research provider capability contract.
//!
//! Implementations are thin adapters over external search/research APIs.
//! Every operation reports its dollar cost; the orchestrator sums these
//! against a hard budget.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Search strategy requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Auto,
    Neural,
    Fast,
    Deep,
}

/// Which content payloads to return inline with results.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContentsSpec {
    #[serde(default)]
    pub text: bool,
    #[serde(default)]
    pub highlights: bool,
    #[serde(default)]
    pub summary: bool,
}

/// Recognized search options.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOptions {
    pub num_results: u32,
    #[serde(rename = "type")]
    pub search_type: SearchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_domains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<ContentsSpec>,
}

impl SearchOptions {
    /// A small, cheap query.
    #[must_use]
    pub fn fast(num_results: u32) -> Self {
        Self {
            num_results: num_results.clamp(1, 100),
            search_type: SearchType::Fast,
            ..Self::default()
        }
    }

    /// The default balanced query.
    #[must_use]
    pub fn standard(num_results: u32) -> Self {
        Self {
            num_results: num_results.clamp(1, 100),
            search_type: SearchType::Auto,
            ..Self::default()
        }
    }
}

/// Live-crawl behavior for content fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Livecrawl {
    Never,
    #[default]
    Fallback,
    Preferred,
    Always,
    Auto,
}

/// Recognized content-fetch options.
#[derive(Debug, Clone, Serialize)]
pub struct ContentsOptions {
    pub text: bool,
    pub highlights: bool,
    pub summary: bool,
    pub livecrawl: Livecrawl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub livecrawl_timeout_ms: Option<u64>,
}

impl Default for ContentsOptions {
    fn default() -> Self {
        Self {
            text: true,
            highlights: false,
            summary: true,
            livecrawl: Livecrawl::Fallback,
            livecrawl_timeout_ms: None,
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResultItem {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub cost_dollars: Decimal,
}

/// One fetched document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Document {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentsResponse {
    pub documents: Vec<Document>,
    pub cost_dollars: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResponse {
    pub answer: String,
    pub citations: Vec<String>,
    pub cost_dollars: Decimal,
}

/// Status of a long-running research task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchTaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchTaskPoll {
    pub status: ResearchTaskStatus,
    pub output: Option<String>,
    pub citations: Vec<String>,
    pub cost_dollars: Decimal,
}

/// Narrow capability contract consumed by the orchestrator.
#[async_trait]
pub trait ResearchProvider: Send + Sync {
    async fn search(&self, query: &str, opts: &SearchOptions) -> Result<SearchResponse>;

    async fn get_contents(&self, urls: &[String], opts: &ContentsOptions)
        -> Result<ContentsResponse>;

    async fn find_similar(&self, url: &str, opts: &SearchOptions) -> Result<SearchResponse>;

    async fn answer(&self, question: &str) -> Result<AnswerResponse>;

    /// Kick off a structured deep-research task; returns the task id.
    async fn start_research_task(
        &self,
        instructions: &str,
        model: &str,
        output_schema: Option<serde_json::Value>,
    ) -> Result<String>;

    async fn poll_research_task(&self, task_id: &str) -> Result<ResearchTaskPoll>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_options_clamp_num_results() {
        assert_eq!(SearchOptions::fast(0).num_results, 1);
        assert_eq!(SearchOptions::standard(500).num_results, 100);
    }

    #[test]
    fn options_serialize_without_empty_fields() {
        let opts = SearchOptions::fast(5);
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["num_results"], 5);
        assert_eq!(json["type"], "fast");
        assert!(json.get("category").is_none());
        assert!(json.get("include_domains").is_none());
    }
}
