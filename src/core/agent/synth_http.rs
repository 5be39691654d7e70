//! HTTP synthesizer adapters.
//!
//! Two chat-completion dialects cover the supported backends: an
//! Anthropic-style messages API (`provider-a`) and an OpenAI-style chat API
//! (`provider-b`, and `local` pointed at a localhost server). Both prompt
//! for strict JSON and parse it into the [`AnalysisResult`] schema.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::synthesizer::{SynthesisInput, Synthesizer};
use crate::core::domain::{AnalysisResult, Confidence, Factor, Polarity};
use crate::error::{ConfigError, Error, Result};

const PROVIDER_A_URL: &str = "https://api.anthropic.com/v1/messages";
const PROVIDER_A_VERSION: &str = "2023-06-01";
const PROVIDER_B_URL: &str = "https://api.openai.com/v1/chat/completions";
const LOCAL_URL: &str = "http://127.0.0.1:8080/v1/chat/completions";

/// Wire dialect of the backing chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatDialect {
    Messages,
    ChatCompletions,
}

/// Chat-API-backed synthesizer.
pub struct ChatSynthesizer {
    http: HttpClient,
    dialect: ChatDialect,
    url: String,
    api_key: String,
    model: String,
    /// Flat per-call cost estimate reported to the budget.
    cost_per_call: Decimal,
}

impl ChatSynthesizer {
    pub fn provider_a(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            dialect: ChatDialect::Messages,
            url: PROVIDER_A_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            cost_per_call: Decimal::new(2, 2), // $0.02
        }
    }

    pub fn provider_b(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            dialect: ChatDialect::ChatCompletions,
            url: PROVIDER_B_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            cost_per_call: Decimal::new(2, 2),
        }
    }

    /// Local OpenAI-compatible server; costs nothing.
    pub fn local(model: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            dialect: ChatDialect::ChatCompletions,
            url: LOCAL_URL.to_string(),
            api_key: String::new(),
            model: model.into(),
            cost_per_call: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn prompt(input: &SynthesisInput) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "You are a prediction market analyst. Respond with a single JSON object \
             and nothing else, matching this schema: {\"predicted_probability\": number in [0,1], \
             \"confidence\": \"low\"|\"medium\"|\"high\", \"reasoning\": string, \
             \"factors\": [{\"text\": string, \"polarity\": \"bullish\"|\"bearish\"|\"neutral\", \
             \"citation_urls\": [string]}]}\n\n",
        );
        prompt.push_str(&format!("Market: {} ({})\n", input.title, input.ticker));
        if let Some(p) = input.market_probability {
            prompt.push_str(&format!("Market-implied probability: {p:.3}\n"));
        }
        if let Some(close) = input.close_time {
            prompt.push_str(&format!("Closes: {close}\n"));
        }
        if let Some(ref thesis) = input.thesis_context {
            prompt.push_str(&format!("\nUser thesis:\n{thesis}\n"));
        }
        prompt.push_str("\nEvidence:\n");
        for factor in &input.factors {
            prompt.push_str(&format!(
                "- {} [{}]\n",
                factor.text,
                factor.citation_urls.join(", ")
            ));
        }
        prompt.push_str("\nSources:\n");
        for url in &input.citations {
            prompt.push_str(&format!("- {url}\n"));
        }
        prompt
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.dialect {
            ChatDialect::Messages => {
                #[derive(Deserialize)]
                struct Response {
                    content: Vec<ContentBlock>,
                }
                #[derive(Deserialize)]
                struct ContentBlock {
                    text: String,
                }

                let body = serde_json::json!({
                    "model": self.model,
                    "max_tokens": 2048,
                    "temperature": 0.2,
                    "messages": [{"role": "user", "content": prompt}],
                });
                let response = self
                    .http
                    .post(&self.url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", PROVIDER_A_VERSION)
                    .header("content-type", "application/json")
                    .json(&body)
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| Error::Connection(e.to_string()))?
                    .json::<Response>()
                    .await?;
                Ok(response
                    .content
                    .into_iter()
                    .map(|c| c.text)
                    .collect::<Vec<_>>()
                    .join(""))
            }
            ChatDialect::ChatCompletions => {
                #[derive(Deserialize)]
                struct Response {
                    choices: Vec<Choice>,
                }
                #[derive(Deserialize)]
                struct Choice {
                    message: Message,
                }
                #[derive(Deserialize)]
                struct Message {
                    content: String,
                }

                let mut request = self.http.post(&self.url);
                if !self.api_key.is_empty() {
                    request = request.bearer_auth(&self.api_key);
                }
                let body = serde_json::json!({
                    "model": self.model,
                    "temperature": 0.2,
                    "messages": [{"role": "user", "content": prompt}],
                });
                let response = request
                    .json(&body)
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| Error::Connection(e.to_string()))?
                    .json::<Response>()
                    .await?;
                response
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| Error::SynthesizerInvalidOutput("empty choices".into()))
            }
        }
    }

    /// Build a backend from environment credentials.
    pub fn provider_a_from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            Error::Config(ConfigError::MissingField {
                field: "ANTHROPIC_API_KEY",
            })
        })?;
        Ok(Self::provider_a(api_key, model))
    }

    pub fn provider_b_from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            Error::Config(ConfigError::MissingField {
                field: "OPENAI_API_KEY",
            })
        })?;
        Ok(Self::provider_b(api_key, model))
    }
}

#[derive(Debug, Deserialize)]
struct WireAnalysis {
    predicted_probability: f64,
    confidence: String,
    reasoning: String,
    #[serde(default)]
    factors: Vec<WireFactor>,
}

#[derive(Debug, Deserialize)]
struct WireFactor {
    text: String,
    #[serde(default)]
    polarity: Option<String>,
    #[serde(default)]
    citation_urls: Vec<String>,
}

/// Extract the JSON object from a possibly chatty completion.
fn extract_json(raw: &str) -> Result<WireAnalysis> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(Error::SynthesizerInvalidOutput(
            "no JSON object in completion".into(),
        ));
    };
    serde_json::from_str(&raw[start..=end])
        .map_err(|e| Error::SynthesizerInvalidOutput(e.to_string()))
}

fn polarity_from(raw: Option<&str>) -> Polarity {
    match raw {
        Some("bullish") => Polarity::Bullish,
        Some("bearish") => Polarity::Bearish,
        _ => Polarity::Neutral,
    }
}

#[async_trait]
impl Synthesizer for ChatSynthesizer {
    fn name(&self) -> &'static str {
        match self.dialect {
            ChatDialect::Messages => "provider-a",
            ChatDialect::ChatCompletions => "provider-b",
        }
    }

    async fn synthesize(&self, input: &SynthesisInput) -> Result<(AnalysisResult, Decimal)> {
        let raw = self.complete(&Self::prompt(input)).await?;
        let wire = extract_json(&raw)?;

        let confidence = Confidence::parse(&wire.confidence).ok_or_else(|| {
            Error::SynthesizerInvalidOutput(format!("bad confidence {:?}", wire.confidence))
        })?;

        let result = AnalysisResult {
            ticker: input.ticker.clone(),
            predicted_probability: wire.predicted_probability,
            confidence,
            reasoning: wire.reasoning,
            factors: wire
                .factors
                .into_iter()
                .map(|f| Factor {
                    text: f.text,
                    polarity: polarity_from(f.polarity.as_deref()),
                    citation_urls: f.citation_urls,
                })
                .collect(),
            citations: input.citations.clone(),
        };
        result
            .validate()
            .map_err(Error::SynthesizerInvalidOutput)?;
        Ok((result, self.cost_per_call))
    }
}
