//! Deterministic verification of synthesized analyses.
//!
//! No model calls here: grounding, calibration sanity, and consistency are
//! all checked mechanically. Verification is advisory; the result is logged
//! and returned but never blocks the analysis.

use std::collections::HashSet;

use crate::core::domain::{AnalysisResult, Confidence, Polarity, VerificationReport};
use crate::core::liquidity::Grade;

/// Thresholds for the verification rules.
#[derive(Debug, Clone, Copy)]
pub struct VerifierConfig {
    /// |predicted - market| above which a high-confidence claim needs at
    /// least three distinct citations.
    pub large_divergence: f64,
    /// |predicted - market| below which any confidence above low is noise.
    pub negligible_divergence: f64,
    /// Divergence that, on a tradable market, suggests escalation.
    pub high_ev_threshold: f64,
    /// Minimum distinct citations before a non-low-confidence claim stands.
    pub min_citations: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            large_divergence: 0.35,
            negligible_divergence: 0.02,
            high_ev_threshold: 0.15,
            min_citations: 2,
        }
    }
}

fn distinct_citations(analysis: &AnalysisResult) -> usize {
    analysis
        .citations
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .len()
}

/// Verify an analysis against the market probability at run time and the
/// market's liquidity grade (when known).
#[must_use]
pub fn verify(
    analysis: &AnalysisResult,
    market_probability: Option<f64>,
    liquidity_grade: Option<Grade>,
    config: &VerifierConfig,
) -> VerificationReport {
    let citation_set: HashSet<&str> = analysis.citations.iter().map(String::as_str).collect();

    // Grounding: every factor must cite at least one URL from the run's
    // citation list.
    let mut ungrounded = Vec::new();
    for factor in &analysis.factors {
        let grounded = factor
            .citation_urls
            .iter()
            .any(|url| citation_set.contains(url.as_str()));
        if !grounded {
            ungrounded.push(factor.text.clone());
        }
    }
    let total = analysis.factors.len();
    let grounding_score = if total == 0 {
        1.0
    } else {
        (total - ungrounded.len()) as f64 / total as f64
    };

    // Calibration sanity.
    let divergence = market_probability.map(|m| analysis.predicted_probability - m);
    let distinct = distinct_citations(analysis);
    let mut calibration_note = None;
    if let Some(divergence) = divergence {
        if analysis.confidence == Confidence::High
            && divergence.abs() > config.large_divergence
            && distinct < 3
        {
            calibration_note = Some(format!(
                "high confidence on a {:.0}-point divergence with only {distinct} distinct sources",
                divergence.abs() * 100.0
            ));
        } else if divergence.abs() < config.negligible_divergence
            && analysis.confidence != Confidence::Low
        {
            calibration_note = Some(format!(
                "{} confidence claimed for a prediction within {:.0}bp of the market",
                analysis.confidence.as_str(),
                divergence.abs() * 10_000.0
            ));
        }
    }

    // Consistency: net factor polarity must not contradict the direction.
    let mut consistency_issues = Vec::new();
    if let Some(divergence) = divergence {
        let net: i64 = analysis
            .factors
            .iter()
            .map(|f| match f.polarity {
                Polarity::Bullish => 1,
                Polarity::Bearish => -1,
                Polarity::Neutral => 0,
            })
            .sum();
        if divergence > config.negligible_divergence && net < 0 {
            consistency_issues.push(format!(
                "prediction is {divergence:+.2} above market but factors lean bearish ({net})"
            ));
        } else if divergence < -config.negligible_divergence && net > 0 {
            consistency_issues.push(format!(
                "prediction is {divergence:+.2} below market but factors lean bullish ({net})"
            ));
        }
    }

    let passed =
        ungrounded.is_empty() && calibration_note.is_none() && consistency_issues.is_empty();

    // Escalation signal.
    let tradable = matches!(liquidity_grade, Some(Grade::Moderate | Grade::Liquid));
    let high_ev = divergence.is_some_and(|d| d.abs() > config.high_ev_threshold);
    let suggested_escalation = !passed
        || analysis.confidence == Confidence::Low
        || (high_ev && tradable)
        || (distinct < config.min_citations && analysis.confidence != Confidence::Low);

    VerificationReport {
        passed,
        grounding_score,
        ungrounded_factors: ungrounded,
        calibration_note,
        consistency_issues,
        suggested_escalation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Factor, Ticker};

    fn factor(text: &str, polarity: Polarity, urls: &[&str]) -> Factor {
        Factor {
            text: text.into(),
            polarity,
            citation_urls: urls.iter().map(ToString::to_string).collect(),
        }
    }

    fn analysis(
        predicted: f64,
        confidence: Confidence,
        factors: Vec<Factor>,
        citations: &[&str],
    ) -> AnalysisResult {
        AnalysisResult {
            ticker: Ticker::from("MKT-1"),
            predicted_probability: predicted,
            confidence,
            reasoning: "test".into(),
            factors,
            citations: citations.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn grounding_score_is_exact_ratio() {
        let a = analysis(
            0.6,
            Confidence::Medium,
            vec![
                factor("cited", Polarity::Bullish, &["https://a.example"]),
                factor("uncited", Polarity::Bullish, &[]),
                factor("wrong url", Polarity::Bullish, &["https://x.example"]),
                factor("also cited", Polarity::Neutral, &["https://b.example"]),
            ],
            &["https://a.example", "https://b.example"],
        );
        let report = verify(&a, Some(0.5), None, &VerifierConfig::default());
        assert!((report.grounding_score - 0.5).abs() < 1e-12);
        assert_eq!(report.ungrounded_factors.len(), 2);
        assert!(!report.passed);
    }

    #[test]
    fn no_factors_means_fully_grounded() {
        let a = analysis(0.55, Confidence::Medium, vec![], &["https://a", "https://b"]);
        let report = verify(&a, Some(0.5), None, &VerifierConfig::default());
        assert_eq!(report.grounding_score, 1.0);
        assert!(report.passed);
    }

    #[test]
    fn high_confidence_large_divergence_needs_three_sources() {
        let a = analysis(0.95, Confidence::High, vec![], &["https://a", "https://b"]);
        let report = verify(&a, Some(0.5), None, &VerifierConfig::default());
        assert!(report.calibration_note.is_some());
        assert!(report.suggested_escalation);

        let well_sourced = analysis(
            0.95,
            Confidence::High,
            vec![],
            &["https://a", "https://b", "https://c"],
        );
        let report = verify(&well_sourced, Some(0.5), None, &VerifierConfig::default());
        assert!(report.calibration_note.is_none());
    }

    #[test]
    fn near_market_prediction_must_claim_low_confidence() {
        let a = analysis(0.505, Confidence::Medium, vec![], &["https://a", "https://b"]);
        let report = verify(&a, Some(0.5), None, &VerifierConfig::default());
        assert!(report.calibration_note.is_some());

        let low = analysis(0.505, Confidence::Low, vec![], &["https://a"]);
        let report = verify(&low, Some(0.5), None, &VerifierConfig::default());
        assert!(report.calibration_note.is_none());
    }

    #[test]
    fn contradictory_polarity_is_flagged() {
        let a = analysis(
            0.7,
            Confidence::Medium,
            vec![
                factor("headwind", Polarity::Bearish, &["https://a"]),
                factor("headwind 2", Polarity::Bearish, &["https://a"]),
            ],
            &["https://a", "https://b"],
        );
        let report = verify(&a, Some(0.5), None, &VerifierConfig::default());
        assert_eq!(report.consistency_issues.len(), 1);
        assert!(!report.passed);
    }

    #[test]
    fn low_confidence_always_escalates() {
        let a = analysis(0.55, Confidence::Low, vec![], &["https://a", "https://b"]);
        let report = verify(&a, Some(0.5), None, &VerifierConfig::default());
        assert!(report.passed);
        assert!(report.suggested_escalation);
    }

    #[test]
    fn high_ev_on_liquid_market_escalates() {
        let a = analysis(
            0.75,
            Confidence::Medium,
            vec![],
            &["https://a", "https://b", "https://c"],
        );
        let liquid = verify(
            &a,
            Some(0.5),
            Some(Grade::Liquid),
            &VerifierConfig::default(),
        );
        assert!(liquid.suggested_escalation);

        let illiquid = verify(
            &a,
            Some(0.5),
            Some(Grade::Illiquid),
            &VerifierConfig::default(),
        );
        assert!(!illiquid.suggested_escalation);
    }

    #[test]
    fn thin_sourcing_with_confidence_escalates() {
        let a = analysis(0.55, Confidence::Medium, vec![], &["https://a"]);
        let report = verify(&a, Some(0.5), None, &VerifierConfig::default());
        assert!(report.suggested_escalation);
    }
}
