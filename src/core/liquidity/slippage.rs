//! Orderbook-walking slippage model.

use crate::core::domain::{FillAction, Level, OrderbookSnapshot, Side};

/// Result of walking the book for a hypothetical order.
#[derive(Debug, Clone, PartialEq)]
pub struct SlippageEstimate {
    pub requested: i64,
    pub filled: i64,
    pub remaining_unfilled: i64,
    /// Volume-weighted average of the prices consumed, in cents.
    pub avg_fill_cents: f64,
    /// Best available price before the walk, in cents.
    pub best_price_cents: f64,
    pub worst_price_cents: f64,
    /// `|avg_fill - best_price|` in cents.
    pub slippage_cents: f64,
    pub slippage_pct: f64,
    /// Total cost (or proceeds) of the filled portion, in cents.
    pub cost_cents: i64,
    pub levels_crossed: u32,
}

impl SlippageEstimate {
    fn unfillable(requested: i64) -> Self {
        Self {
            requested,
            filled: 0,
            remaining_unfilled: requested,
            avg_fill_cents: 0.0,
            best_price_cents: 0.0,
            worst_price_cents: 0.0,
            slippage_cents: 0.0,
            slippage_pct: 0.0,
            cost_cents: 0,
            levels_crossed: 0,
        }
    }
}

/// The book levels an order consumes, best-first.
///
/// Buying consumes the implied asks of the requested side (the opposite
/// side's bids inverted to `100 - price`, lowest first); selling consumes
/// the side's own bids, highest first.
fn consumable_levels(book: &OrderbookSnapshot, side: Side, action: FillAction) -> Vec<Level> {
    match action {
        FillAction::Buy => book.implied_asks(side),
        FillAction::Sell => book.bids(side).to_vec(),
    }
}

/// Walk the book best-to-worst for `(side, action, quantity)`.
#[must_use]
pub fn estimate_slippage(
    book: &OrderbookSnapshot,
    side: Side,
    action: FillAction,
    quantity: i64,
) -> SlippageEstimate {
    if quantity <= 0 {
        return SlippageEstimate::unfillable(quantity.max(0));
    }

    let levels = consumable_levels(book, side, action);
    let Some(best) = levels.first() else {
        return SlippageEstimate::unfillable(quantity);
    };
    let best_price = best.price_cents as f64;

    let mut remaining = quantity;
    let mut filled = 0i64;
    let mut cost = 0i64;
    let mut worst_price = best_price;
    let mut levels_crossed = 0u32;

    for level in &levels {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(level.quantity);
        filled += take;
        cost += take * level.price_cents;
        worst_price = level.price_cents as f64;
        levels_crossed += 1;
        remaining -= take;
    }

    let avg_fill = if filled > 0 {
        cost as f64 / filled as f64
    } else {
        0.0
    };
    let slippage = if filled > 0 {
        (avg_fill - best_price).abs()
    } else {
        0.0
    };
    let slippage_pct = if best_price > 0.0 && filled > 0 {
        slippage / best_price * 100.0
    } else {
        0.0
    };

    SlippageEstimate {
        requested: quantity,
        filled,
        remaining_unfilled: remaining,
        avg_fill_cents: avg_fill,
        best_price_cents: best_price,
        worst_price_cents: worst_price,
        slippage_cents: slippage,
        slippage_pct,
        cost_cents: cost,
        levels_crossed,
    }
}

/// Largest quantity whose estimated slippage stays within
/// `tolerance_cents` and which the book can fill completely. Unfillable
/// sizes are disqualified regardless of apparent slippage.
#[must_use]
pub fn max_safe_order_size(
    book: &OrderbookSnapshot,
    side: Side,
    action: FillAction,
    tolerance_cents: f64,
) -> i64 {
    let available: i64 = consumable_levels(book, side, action)
        .iter()
        .map(|l| l.quantity)
        .sum();
    if available == 0 {
        return 0;
    }

    let fits = |n: i64| -> bool {
        if n == 0 {
            return true;
        }
        let est = estimate_slippage(book, side, action, n);
        est.remaining_unfilled == 0 && est.slippage_cents <= tolerance_cents
    };

    let mut lo = 0i64;
    let mut hi = available;
    // fits() is monotone: true at 0, false past the safe boundary.
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::book;

    #[test]
    fn buy_yes_consumes_inverted_no_bids_best_first() {
        // NO bids 53/54/55 imply YES asks 47/46/45; the walk starts at 45.
        let b = book("MKT-1", &[], &[(53, 100), (54, 100), (55, 100)]);
        let est = estimate_slippage(&b, Side::Yes, FillAction::Buy, 250);

        assert_eq!(est.filled, 250);
        assert_eq!(est.remaining_unfilled, 0);
        assert_eq!(est.best_price_cents, 45.0);
        assert_eq!(est.cost_cents, 100 * 45 + 100 * 46 + 50 * 47);
        assert!((est.avg_fill_cents - 45.8).abs() < 1e-9);
        assert!((est.slippage_cents - 0.8).abs() < 1e-9);
        assert_eq!(est.levels_crossed, 3);
    }

    #[test]
    fn sell_yes_consumes_yes_bids_directly() {
        let b = book("MKT-1", &[(48, 50), (47, 50)], &[]);
        let est = estimate_slippage(&b, Side::Yes, FillAction::Sell, 80);
        assert_eq!(est.filled, 80);
        assert_eq!(est.best_price_cents, 48.0);
        assert_eq!(est.worst_price_cents, 47.0);
        assert_eq!(est.cost_cents, 50 * 48 + 30 * 47);
        assert_eq!(est.levels_crossed, 2);
    }

    #[test]
    fn filled_plus_remaining_equals_requested() {
        let b = book("MKT-1", &[], &[(55, 100)]);
        for quantity in [0, 1, 50, 100, 101, 500] {
            let est = estimate_slippage(&b, Side::Yes, FillAction::Buy, quantity);
            assert_eq!(est.filled + est.remaining_unfilled, quantity.max(0));
        }
    }

    #[test]
    fn single_level_fill_has_zero_slippage() {
        let b = book("MKT-1", &[], &[(55, 100)]);
        let est = estimate_slippage(&b, Side::Yes, FillAction::Buy, 100);
        assert_eq!(est.slippage_cents, 0.0);
        assert_eq!(est.levels_crossed, 1);
    }

    #[test]
    fn empty_book_estimate_is_safe() {
        let b = book("MKT-1", &[], &[]);
        let est = estimate_slippage(&b, Side::Yes, FillAction::Buy, 100);
        assert_eq!(est.filled, 0);
        assert_eq!(est.remaining_unfilled, 100);
        assert_eq!(est.slippage_cents, 0.0);
    }

    #[test]
    fn max_safe_size_respects_tolerance() {
        // Asks at 45 (100), 46 (100), 50 (100). Tolerance 1c:
        // 200 contracts average 45.5 (slippage 0.5); adding any of the 50s
        // pushes slippage past 1c before depth runs out.
        let b = book("MKT-1", &[], &[(55, 100), (54, 100), (50, 100)]);
        let safe = max_safe_order_size(&b, Side::Yes, FillAction::Buy, 1.0);
        assert!(safe >= 200, "safe {safe}");
        let est = estimate_slippage(&b, Side::Yes, FillAction::Buy, safe);
        assert_eq!(est.remaining_unfilled, 0);
        assert!(est.slippage_cents <= 1.0);
        // One more contract must violate a constraint.
        let next = estimate_slippage(&b, Side::Yes, FillAction::Buy, safe + 1);
        assert!(next.slippage_cents > 1.0 || next.remaining_unfilled > 0);
    }

    #[test]
    fn max_safe_size_disqualifies_unfillable_quantities() {
        let b = book("MKT-1", &[], &[(55, 100)]);
        // Everything fillable has zero slippage, so the cap is the depth.
        assert_eq!(max_safe_order_size(&b, Side::Yes, FillAction::Buy, 5.0), 100);
    }

    #[test]
    fn max_safe_size_of_empty_book_is_zero() {
        let b = book("MKT-1", &[], &[]);
        assert_eq!(max_safe_order_size(&b, Side::Yes, FillAction::Buy, 5.0), 0);
    }
}
