//! Composite liquidity score and grade.

use serde::Deserialize;

/// Component weights for the composite score. Must sum to 1.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_spread_weight")]
    pub spread: f64,
    #[serde(default = "default_depth_weight")]
    pub depth: f64,
    #[serde(default = "default_volume_weight")]
    pub volume: f64,
    #[serde(default = "default_open_interest_weight")]
    pub open_interest: f64,
}

fn default_spread_weight() -> f64 {
    0.30
}
fn default_depth_weight() -> f64 {
    0.30
}
fn default_volume_weight() -> f64 {
    0.20
}
fn default_open_interest_weight() -> f64 {
    0.20
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            spread: default_spread_weight(),
            depth: default_depth_weight(),
            volume: default_volume_weight(),
            open_interest: default_open_interest_weight(),
        }
    }
}

impl ScoreWeights {
    /// Check the sum-to-one constraint.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        let sum = self.spread + self.depth + self.volume + self.open_interest;
        (sum - 1.0).abs() < 1e-9
    }
}

/// Composite liquidity grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    Illiquid,
    Thin,
    Moderate,
    Liquid,
}

impl Grade {
    /// Cutoffs: `>= 76` liquid, `>= 51` moderate, `>= 26` thin.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            76.. => Self::Liquid,
            51..=75 => Self::Moderate,
            26..=50 => Self::Thin,
            _ => Self::Illiquid,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Illiquid => "illiquid",
            Self::Thin => "thin",
            Self::Moderate => "moderate",
            Self::Liquid => "liquid",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite 0-100 score.
///
/// Component mappings: spread `max(0, 100 - 5*spread)`, depth
/// `min(100, weighted/10)`, volume `min(100, volume_24h/100)`, open interest
/// `min(100, oi/50)`. Components truncate to whole points before weighting;
/// the weighted sum rounds to the nearest point. A missing spread scores
/// zero on that component.
#[must_use]
pub fn composite_score(
    spread_cents: Option<f64>,
    weighted_depth: f64,
    volume_24h: i64,
    open_interest: i64,
    weights: &ScoreWeights,
) -> u8 {
    let spread_score = match spread_cents {
        Some(s) => (100.0 - 5.0 * s).max(0.0),
        None => 0.0,
    };
    let depth_score = (weighted_depth / 10.0).min(100.0);
    let volume_score = (volume_24h as f64 / 100.0).min(100.0);
    let oi_score = (open_interest as f64 / 50.0).min(100.0);

    let total = spread_score.trunc() * weights.spread
        + depth_score.trunc() * weights.depth
        + volume_score.trunc() * weights.volume
        + oi_score.trunc() * weights.open_interest;

    total.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_market_scores_78_liquid() {
        // spread=3 -> 85, depth=823 -> 82, volume=7012 -> 70, oi=3421 -> 68:
        // 85*.30 + 82*.30 + 70*.20 + 68*.20 = 77.7 -> 78.
        let score = composite_score(Some(3.0), 823.0, 7012, 3421, &ScoreWeights::default());
        assert_eq!(score, 78);
        assert_eq!(Grade::from_score(score), Grade::Liquid);
    }

    #[test]
    fn components_saturate_at_100() {
        let score = composite_score(Some(0.0), 1e9, i64::MAX / 2, i64::MAX / 2, &ScoreWeights::default());
        assert_eq!(score, 100);
    }

    #[test]
    fn very_wide_spread_floors_at_zero() {
        let score = composite_score(Some(40.0), 0.0, 0, 0, &ScoreWeights::default());
        assert_eq!(score, 0);
        assert_eq!(Grade::from_score(score), Grade::Illiquid);
    }

    #[test]
    fn grade_cutoffs_are_inclusive() {
        assert_eq!(Grade::from_score(76), Grade::Liquid);
        assert_eq!(Grade::from_score(75), Grade::Moderate);
        assert_eq!(Grade::from_score(51), Grade::Moderate);
        assert_eq!(Grade::from_score(50), Grade::Thin);
        assert_eq!(Grade::from_score(26), Grade::Thin);
        assert_eq!(Grade::from_score(25), Grade::Illiquid);
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!(ScoreWeights::default().is_normalized());
    }
}
