//! Distance-weighted depth scoring.

use crate::core::domain::{OrderbookSnapshot, Side};

/// Depth within a radius of the midpoint, plus raw per-side totals.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthReport {
    /// `sum(quantity * weight)` over levels within the radius, where weight
    /// decays linearly with distance from the midpoint.
    pub weighted_score: f64,
    pub yes_contracts: i64,
    pub no_contracts: i64,
    /// `(yes - no) / total`, zero for an empty book.
    pub imbalance: f64,
}

impl DepthReport {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            weighted_score: 0.0,
            yes_contracts: 0,
            no_contracts: 0,
            imbalance: 0.0,
        }
    }
}

/// Score resting depth around `mid_cents` within `radius_cents`.
///
/// A level's effective price is its own price for YES bids and `100 - price`
/// for NO bids, so both sides measure distance on the YES axis. Weight is
/// `1 - d / (radius + 1)` for `d <= radius`, else zero.
#[must_use]
pub fn depth_score(book: &OrderbookSnapshot, mid_cents: f64, radius_cents: i64) -> DepthReport {
    let radius = radius_cents.max(0) as f64;
    let mut weighted = 0.0;

    for side in [Side::Yes, Side::No] {
        for level in book.bids(side) {
            let effective = match side {
                Side::Yes => level.price_cents as f64,
                Side::No => (100 - level.price_cents) as f64,
            };
            let distance = (effective - mid_cents).abs();
            if distance <= radius {
                let weight = 1.0 - distance / (radius + 1.0);
                weighted += level.quantity as f64 * weight;
            }
        }
    }

    let yes_contracts = book.total_quantity(Side::Yes);
    let no_contracts = book.total_quantity(Side::No);
    let total = yes_contracts + no_contracts;
    let imbalance = if total == 0 {
        0.0
    } else {
        (yes_contracts - no_contracts) as f64 / total as f64
    };

    DepthReport {
        weighted_score: weighted,
        yes_contracts,
        no_contracts,
        imbalance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::book;

    #[test]
    fn empty_book_scores_zero() {
        let b = book("MKT-1", &[], &[]);
        let report = depth_score(&b, 50.0, 10);
        assert_eq!(report, DepthReport::empty());
    }

    #[test]
    fn level_at_midpoint_has_full_weight() {
        let b = book("MKT-1", &[(50, 100)], &[]);
        let report = depth_score(&b, 50.0, 10);
        assert!((report.weighted_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn weight_decays_linearly_with_distance() {
        // Distance 5 with radius 10: weight = 1 - 5/11.
        let b = book("MKT-1", &[(45, 100)], &[]);
        let report = depth_score(&b, 50.0, 10);
        let expected = 100.0 * (1.0 - 5.0 / 11.0);
        assert!((report.weighted_score - expected).abs() < 1e-9);
    }

    #[test]
    fn levels_outside_radius_contribute_nothing() {
        let b = book("MKT-1", &[(30, 1000)], &[]);
        let report = depth_score(&b, 50.0, 10);
        assert_eq!(report.weighted_score, 0.0);
        // Raw totals still count the outside level.
        assert_eq!(report.yes_contracts, 1000);
    }

    #[test]
    fn no_side_uses_inverted_effective_price() {
        // NO bid at 52 has effective YES price 48, distance 2 from mid 50.
        let b = book("MKT-1", &[], &[(52, 100)]);
        let report = depth_score(&b, 50.0, 10);
        let expected = 100.0 * (1.0 - 2.0 / 11.0);
        assert!((report.weighted_score - expected).abs() < 1e-9);
    }

    #[test]
    fn imbalance_is_signed_ratio() {
        let b = book("MKT-1", &[(50, 300)], &[(50, 100)]);
        let report = depth_score(&b, 50.0, 10);
        assert!((report.imbalance - 0.5).abs() < 1e-9);
    }
}
