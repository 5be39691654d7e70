//! The synthesizer contract: research evidence in, structured probability
//! and reasoning out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::domain::{AnalysisResult, Confidence, Factor, Polarity, Ticker};
use crate::error::{ConfigError, Error, Result};

/// Everything a synthesizer sees for one run.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisInput {
    pub ticker: Ticker,
    pub title: String,
    /// Market-implied probability at run time.
    pub market_probability: Option<f64>,
    pub close_time: Option<DateTime<Utc>>,
    /// Evidence gathered by the research step.
    pub factors: Vec<Factor>,
    pub citations: Vec<String>,
    /// User-pinned thesis text, when one covers this ticker.
    pub thesis_context: Option<String>,
}

/// Structured synthesis seam. Implementations must produce the
/// [`AnalysisResult`] schema exactly; the orchestrator retries one schema
/// violation and then surfaces `SynthesizerInvalidOutput`.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce an analysis and report the call's cost.
    async fn synthesize(&self, input: &SynthesisInput) -> Result<(AnalysisResult, Decimal)>;
}

/// Which synthesizer implementation to dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesizerBackend {
    #[default]
    Mock,
    ProviderA,
    ProviderB,
    Local,
}

impl SynthesizerBackend {
    /// Resolve from `SYNTHESIZER_BACKEND`; unset means mock.
    pub fn from_env() -> Result<Self> {
        match std::env::var("SYNTHESIZER_BACKEND") {
            Err(_) => Ok(Self::Mock),
            Ok(raw) => match raw.as_str() {
                "mock" => Ok(Self::Mock),
                "provider-a" => Ok(Self::ProviderA),
                "provider-b" => Ok(Self::ProviderB),
                "local" => Ok(Self::Local),
                _ => Err(Error::Config(ConfigError::InvalidValue {
                    field: "SYNTHESIZER_BACKEND",
                    value: raw,
                })),
            },
        }
    }
}

/// Deterministic offline synthesizer used for dry runs and tests.
///
/// Leans the market probability by the net polarity of the evidence, one
/// point per factor, and claims medium confidence when it has citations.
pub struct MockSynthesizer;

#[async_trait]
impl Synthesizer for MockSynthesizer {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn synthesize(&self, input: &SynthesisInput) -> Result<(AnalysisResult, Decimal)> {
        let base = input.market_probability.unwrap_or(0.5);
        let lean: f64 = input
            .factors
            .iter()
            .map(|f| match f.polarity {
                Polarity::Bullish => 0.01,
                Polarity::Bearish => -0.01,
                Polarity::Neutral => 0.0,
            })
            .sum();
        let predicted = (base + lean).clamp(0.01, 0.99);

        let confidence = if input.citations.len() >= 2 {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        let result = AnalysisResult {
            ticker: input.ticker.clone(),
            predicted_probability: predicted,
            confidence,
            reasoning: format!(
                "Offline synthesis from {} factors across {} sources.",
                input.factors.len(),
                input.citations.len()
            ),
            factors: input.factors.clone(),
            citations: input.citations.clone(),
        };
        Ok((result, Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(factors: Vec<Factor>, citations: Vec<String>) -> SynthesisInput {
        SynthesisInput {
            ticker: Ticker::from("MKT-1"),
            title: "Test".into(),
            market_probability: Some(0.5),
            close_time: None,
            factors,
            citations,
            thesis_context: None,
        }
    }

    #[tokio::test]
    async fn mock_output_passes_schema_validation() {
        let (result, cost) = MockSynthesizer
            .synthesize(&input(vec![], vec![]))
            .await
            .unwrap();
        assert!(result.validate().is_ok());
        assert_eq!(cost, Decimal::ZERO);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn mock_leans_with_factor_polarity() {
        let factors = vec![
            Factor {
                text: "tailwind".into(),
                polarity: Polarity::Bullish,
                citation_urls: vec![],
            },
            Factor {
                text: "tailwind 2".into(),
                polarity: Polarity::Bullish,
                citation_urls: vec![],
            },
        ];
        let (result, _) = MockSynthesizer
            .synthesize(&input(factors, vec!["a".into(), "b".into()]))
            .await
            .unwrap();
        assert!(result.predicted_probability > 0.5);
        assert_eq!(result.confidence, Confidence::Medium);
    }
}
