//! Agent output types: analysis results, verification reports, and the
//! persisted prediction log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::Ticker;

/// Self-reported confidence of a synthesized analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Directional lean of a factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Bullish,
    Bearish,
    Neutral,
}

/// One supporting factor in an analysis, with the URLs it leans on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub text: String,
    pub polarity: Polarity,
    /// URLs cited for this factor. A factor making a factual claim must cite
    /// at least one URL from the run's citation list to count as grounded.
    #[serde(default)]
    pub citation_urls: Vec<String>,
}

/// Output of the synthesizer. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ticker: Ticker,
    /// Predicted probability of YES settlement, in `[0, 1]`.
    pub predicted_probability: f64,
    pub confidence: Confidence,
    pub reasoning: String,
    pub factors: Vec<Factor>,
    /// All source URLs gathered during research.
    pub citations: Vec<String>,
}

impl AnalysisResult {
    /// Schema validation applied to every synthesizer response.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.predicted_probability) {
            return Err(format!(
                "predicted_probability {} outside [0, 1]",
                self.predicted_probability
            ));
        }
        if self.reasoning.trim().is_empty() {
            return Err("reasoning is empty".to_string());
        }
        Ok(())
    }
}

/// Deterministic verification outcome. Advisory: logged and returned, never
/// blocking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub passed: bool,
    /// `grounded_factors / total_factors`; 1.0 when there are no factors.
    pub grounding_score: f64,
    pub ungrounded_factors: Vec<String>,
    pub calibration_note: Option<String>,
    pub consistency_issues: Vec<String>,
    pub suggested_escalation: bool,
}

/// Terminal status of an orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Failed,
}

impl RunStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
        }
    }
}

/// Persisted record of one prediction. Outcome and Brier score are filled in
/// asynchronously when the referenced market settles.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionLog {
    pub ticker: Ticker,
    pub predicted_prob: f64,
    pub market_prob_at_time: Option<f64>,
    pub confidence: Confidence,
    pub reasoning: String,
    pub factors_json: String,
    pub status: RunStatus,
    pub diagnostic: Option<String>,
    pub predicted_at: DateTime<Utc>,
    pub actual_outcome: Option<i32>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub brier_score: Option<f64>,
}

impl PredictionLog {
    /// Brier score for a resolved binary prediction:
    /// `(predicted - outcome)^2`.
    #[must_use]
    pub fn brier(predicted: f64, outcome: i32) -> f64 {
        let diff = predicted - f64::from(outcome);
        diff * diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brier_is_squared_error_and_bounded() {
        assert!((PredictionLog::brier(0.7, 1) - 0.09).abs() < 1e-12);
        assert!((PredictionLog::brier(0.7, 0) - 0.49).abs() < 1e-12);
        assert_eq!(PredictionLog::brier(1.0, 1), 0.0);
        assert_eq!(PredictionLog::brier(0.0, 1), 1.0);
    }

    #[test]
    fn analysis_validation_rejects_out_of_range_probability() {
        let result = AnalysisResult {
            ticker: Ticker::from("MKT-1"),
            predicted_probability: 1.2,
            confidence: Confidence::Medium,
            reasoning: "because".into(),
            factors: vec![],
            citations: vec![],
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn analysis_validation_rejects_empty_reasoning() {
        let result = AnalysisResult {
            ticker: Ticker::from("MKT-1"),
            predicted_probability: 0.5,
            confidence: Confidence::Low,
            reasoning: "  ".into(),
            factors: vec![],
            citations: vec![],
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn confidence_ordering_low_to_high() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }
}
