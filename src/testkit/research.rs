//! Scripted research and synthesizer doubles.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core::agent::research::{
    AnswerResponse, ContentsOptions, ContentsResponse, Document, ResearchProvider,
    ResearchTaskPoll, ResearchTaskStatus, SearchOptions, SearchResponse, SearchResultItem,
};
use crate::core::agent::synthesizer::{SynthesisInput, Synthesizer};
use crate::core::domain::AnalysisResult;
use crate::error::{Error, Result};

/// A research provider returning canned results with configurable costs.
pub struct ScriptedResearchProvider {
    pub search_cost: Decimal,
    pub contents_cost: Decimal,
    pub answer_cost: Decimal,
    pub deep_cost: Decimal,
    /// Polls before the deep task completes.
    pub deep_polls: u32,
    pub urls: Vec<String>,
    pub search_calls: AtomicU32,
    pub contents_calls: AtomicU32,
    pub answer_calls: AtomicU32,
    pub task_calls: AtomicU32,
    pub polls_seen: AtomicU32,
}

impl Default for ScriptedResearchProvider {
    fn default() -> Self {
        Self {
            search_cost: Decimal::new(1, 2),
            contents_cost: Decimal::new(2, 2),
            answer_cost: Decimal::new(1, 2),
            deep_cost: Decimal::new(15, 2),
            deep_polls: 1,
            urls: vec![
                "https://news.example/one".into(),
                "https://news.example/two".into(),
                "https://news.example/three".into(),
            ],
            search_calls: AtomicU32::new(0),
            contents_calls: AtomicU32::new(0),
            answer_calls: AtomicU32::new(0),
            task_calls: AtomicU32::new(0),
            polls_seen: AtomicU32::new(0),
        }
    }
}

impl ScriptedResearchProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResearchProvider for ScriptedResearchProvider {
    async fn search(&self, _query: &str, opts: &SearchOptions) -> Result<SearchResponse> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let results = self
            .urls
            .iter()
            .take(opts.num_results as usize)
            .enumerate()
            .map(|(i, url)| SearchResultItem {
                url: url.clone(),
                title: format!("Headline {i}"),
                snippet: Some(format!("Snippet {i} about the market.")),
                published_date: None,
            })
            .collect();
        Ok(SearchResponse {
            results,
            cost_dollars: self.search_cost,
        })
    }

    async fn get_contents(
        &self,
        urls: &[String],
        _opts: &ContentsOptions,
    ) -> Result<ContentsResponse> {
        self.contents_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ContentsResponse {
            documents: urls
                .iter()
                .map(|url| Document {
                    url: url.clone(),
                    title: "doc".into(),
                    text: None,
                    summary: Some(format!("Summary of {url}.")),
                })
                .collect(),
            cost_dollars: self.contents_cost,
        })
    }

    async fn find_similar(&self, _url: &str, _opts: &SearchOptions) -> Result<SearchResponse> {
        Ok(SearchResponse {
            results: Vec::new(),
            cost_dollars: Decimal::ZERO,
        })
    }

    async fn answer(&self, _question: &str) -> Result<AnswerResponse> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AnswerResponse {
            answer: "The latest reporting is mixed.".into(),
            citations: self.urls.clone(),
            cost_dollars: self.answer_cost,
        })
    }

    async fn start_research_task(
        &self,
        _instructions: &str,
        _model: &str,
        _output_schema: Option<serde_json::Value>,
    ) -> Result<String> {
        self.task_calls.fetch_add(1, Ordering::SeqCst);
        Ok("task-1".into())
    }

    async fn poll_research_task(&self, _task_id: &str) -> Result<ResearchTaskPoll> {
        let seen = self.polls_seen.fetch_add(1, Ordering::SeqCst);
        if seen + 1 < self.deep_polls {
            return Ok(ResearchTaskPoll {
                status: ResearchTaskStatus::Running,
                output: None,
                citations: Vec::new(),
                cost_dollars: Decimal::ZERO,
            });
        }
        Ok(ResearchTaskPoll {
            status: ResearchTaskStatus::Completed,
            output: Some("Deep research findings.".into()),
            citations: self.urls.clone(),
            cost_dollars: self.deep_cost,
        })
    }
}

/// Wraps a synthesizer, failing schema validation for the first
/// `invalid_first_n` calls. For retry behavior tests.
pub struct CountingSynthesizer<S> {
    inner: S,
    invalid_first_n: u32,
    pub calls: AtomicU32,
}

impl<S> CountingSynthesizer<S> {
    pub fn new(inner: S, invalid_first_n: u32) -> Self {
        Self {
            inner,
            invalid_first_n,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl<S: Synthesizer> Synthesizer for CountingSynthesizer<S> {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn synthesize(&self, input: &SynthesisInput) -> Result<(AnalysisResult, Decimal)> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.invalid_first_n {
            return Err(Error::SynthesizerInvalidOutput(format!(
                "scripted invalid output on call {call}"
            )));
        }
        self.inner.synthesize(input).await
    }
}
