//! User-authored research theses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ThesisId, Ticker};

/// Lifecycle of a thesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThesisStatus {
    Draft,
    Active,
    Resolved,
    Void,
}

impl ThesisStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            "void" => Some(Self::Void),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Void => "void",
        }
    }
}

/// A research object the user maintains against one or more markets.
///
/// Mutated by user commands only; the orchestrator reads active theses as
/// prior context for the synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Thesis {
    pub id: ThesisId,
    pub title: String,
    pub markets: Vec<Ticker>,
    pub your_probability: f64,
    pub market_probability: f64,
    pub confidence: f64,
    pub status: ThesisStatus,
    pub resolution_outcome: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thesis {
    /// Create a draft thesis.
    pub fn draft(
        title: impl Into<String>,
        markets: Vec<Ticker>,
        your_probability: f64,
        market_probability: f64,
        confidence: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ThesisId::new(),
            title: title.into(),
            markets,
            your_probability,
            market_probability,
            confidence,
            status: ThesisStatus::Draft,
            resolution_outcome: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this thesis covers the given ticker.
    #[must_use]
    pub fn covers(&self, ticker: &Ticker) -> bool {
        self.markets.contains(ticker)
    }

    /// The edge the user believes exists, as your minus market probability.
    #[must_use]
    pub fn claimed_edge(&self) -> f64 {
        self.your_probability - self.market_probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_starts_unresolved_with_uuid() {
        let t = Thesis::draft("Rates hold", vec![Ticker::from("FED-24")], 0.7, 0.55, 0.6);
        assert_eq!(t.status, ThesisStatus::Draft);
        assert!(t.resolution_outcome.is_none());
        assert_eq!(t.id.as_str().len(), 36);
    }

    #[test]
    fn covers_checks_membership() {
        let t = Thesis::draft("x", vec![Ticker::from("A"), Ticker::from("B")], 0.5, 0.5, 0.5);
        assert!(t.covers(&Ticker::from("B")));
        assert!(!t.covers(&Ticker::from("C")));
    }

    #[test]
    fn claimed_edge_is_signed() {
        let t = Thesis::draft("x", vec![], 0.40, 0.55, 0.5);
        assert!((t.claimed_edge() + 0.15).abs() < 1e-12);
    }
}
