//! Liquidity analysis: orderbook depth, slippage estimation, and a
//! composite 0-100 score with a letter-style grade.
//!
//! Everything here is pure computation over a [`Market`] and an
//! [`OrderbookSnapshot`]; nothing blocks.

mod depth;
mod score;
mod slippage;

pub use depth::{depth_score, DepthReport};
pub use score::{composite_score, Grade, ScoreWeights};
pub use slippage::{estimate_slippage, max_safe_order_size, SlippageEstimate};

use serde::Deserialize;

use crate::core::domain::{FillAction, Market, OrderbookSnapshot, Side};

/// Tunable thresholds for liquidity analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityConfig {
    /// Depth radius around the midpoint, in cents.
    #[serde(default = "default_radius_cents")]
    pub radius_cents: i64,
    /// Max acceptable slippage for the safe-size search, in cents.
    #[serde(default = "default_tolerance_cents")]
    pub tolerance_cents: f64,
    /// Order sizes probed for the slippage table.
    #[serde(default = "default_probe_sizes")]
    pub probe_sizes: Vec<i64>,
    #[serde(default)]
    pub weights: ScoreWeights,
}

fn default_radius_cents() -> i64 {
    10
}

fn default_tolerance_cents() -> f64 {
    2.0
}

fn default_probe_sizes() -> Vec<i64> {
    vec![10, 50, 100, 500, 1000]
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            radius_cents: default_radius_cents(),
            tolerance_cents: default_tolerance_cents(),
            probe_sizes: default_probe_sizes(),
            weights: ScoreWeights::default(),
        }
    }
}

/// Full analysis for one market.
#[derive(Debug, Clone)]
pub struct LiquidityAnalysis {
    pub score: u8,
    pub grade: Grade,
    pub depth: DepthReport,
    /// Buy-YES slippage estimates at the configured probe sizes.
    pub slippage_table: Vec<SlippageEstimate>,
    pub max_safe_size: i64,
    pub warnings: Vec<String>,
}

/// Analyze a market against its current orderbook.
#[must_use]
pub fn analyze(market: &Market, book: &OrderbookSnapshot, config: &LiquidityConfig) -> LiquidityAnalysis {
    // Prefer the book's own midpoint; fall back to the quoted midpoint.
    let mid_cents = book
        .midpoint_cents()
        .or_else(|| market.midpoint().map(|p| p * 100.0));

    let depth = match mid_cents {
        Some(mid) => depth_score(book, mid, config.radius_cents),
        None => DepthReport::empty(),
    };

    let spread_cents = book
        .spread_cents()
        .map(|s| s as f64)
        .or_else(|| market.spread_cents());

    let score = composite_score(
        spread_cents,
        depth.weighted_score,
        market.volume_24h,
        market.open_interest,
        &config.weights,
    );
    let grade = Grade::from_score(score);

    let slippage_table = config
        .probe_sizes
        .iter()
        .map(|&size| estimate_slippage(book, Side::Yes, FillAction::Buy, size))
        .collect();
    let max_safe_size =
        max_safe_order_size(book, Side::Yes, FillAction::Buy, config.tolerance_cents);

    let mut warnings = Vec::new();
    if let Some(spread) = spread_cents {
        if spread > 10.0 {
            warnings.push(format!("wide spread: {spread:.0}c"));
        }
    }
    let total_contracts = depth.yes_contracts + depth.no_contracts;
    if total_contracts < 100 {
        warnings.push(format!("thin book: {total_contracts} resting contracts"));
    }
    if depth.imbalance.abs() > 0.5 {
        warnings.push(format!("one-sided book: imbalance {:+.2}", depth.imbalance));
    }
    if market.volume_24h < 1000 {
        warnings.push(format!("low 24h volume: {}", market.volume_24h));
    }

    LiquidityAnalysis {
        score,
        grade,
        depth,
        slippage_table,
        max_safe_size,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{book, market};

    #[test]
    fn empty_orderbook_does_not_crash() {
        let market = market("MKT-1", None, None);
        let book = book("MKT-1", &[], &[]);
        let analysis = analyze(&market, &book, &LiquidityConfig::default());
        assert_eq!(analysis.depth.weighted_score, 0.0);
        assert_eq!(analysis.max_safe_size, 0);
        assert_eq!(analysis.grade, Grade::Illiquid);
    }

    #[test]
    fn healthy_market_collects_no_warnings() {
        let mut m = market("MKT-1", Some(48), Some(50));
        m.volume_24h = 20_000;
        m.open_interest = 10_000;
        let b = book(
            "MKT-1",
            &[(48, 800), (47, 700), (46, 600)],
            &[(50, 800), (49, 700), (48, 600)],
        );
        let analysis = analyze(&m, &b, &LiquidityConfig::default());
        assert!(analysis.warnings.is_empty(), "{:?}", analysis.warnings);
        assert!(analysis.score >= 76, "score {}", analysis.score);
    }

    #[test]
    fn thin_one_sided_book_warns() {
        let mut m = market("MKT-1", Some(30), Some(55));
        m.volume_24h = 10;
        let b = book("MKT-1", &[(30, 40)], &[]);
        let analysis = analyze(&m, &b, &LiquidityConfig::default());
        assert!(analysis.warnings.len() >= 3, "{:?}", analysis.warnings);
    }
}
