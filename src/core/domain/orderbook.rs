//! Orderbook snapshot domain type.
//!
//! The exchange book carries resting bids only; each side's asks are implied
//! by the opposite side's bids at `100 - price`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::Ticker;
use crate::error::{Error, Result};

/// Contract side of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

/// A single price level: integer cents and resting contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price_cents: i64,
    pub quantity: i64,
}

impl Level {
    #[must_use]
    pub const fn new(price_cents: i64, quantity: i64) -> Self {
        Self {
            price_cents,
            quantity,
        }
    }
}

/// An immutable snapshot of a market's resting bids, best-first per side.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderbookSnapshot {
    ticker: Ticker,
    yes_bids: Vec<Level>,
    no_bids: Vec<Level>,
    fetched_at: DateTime<Utc>,
}

impl OrderbookSnapshot {
    /// Build a snapshot, validating side invariants: positive quantities, no
    /// duplicate prices, bids sorted best-first (descending price).
    pub fn new(
        ticker: Ticker,
        mut yes_bids: Vec<Level>,
        mut no_bids: Vec<Level>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self> {
        yes_bids.sort_by(|a, b| b.price_cents.cmp(&a.price_cents));
        no_bids.sort_by(|a, b| b.price_cents.cmp(&a.price_cents));
        Self::validate_side(&ticker, "yes", &yes_bids)?;
        Self::validate_side(&ticker, "no", &no_bids)?;
        Ok(Self {
            ticker,
            yes_bids,
            no_bids,
            fetched_at,
        })
    }

    fn validate_side(ticker: &Ticker, side: &str, levels: &[Level]) -> Result<()> {
        for pair in levels.windows(2) {
            if pair[0].price_cents == pair[1].price_cents {
                return Err(Error::Validation(format!(
                    "{ticker}: duplicate {side} price level {}",
                    pair[0].price_cents
                )));
            }
        }
        for level in levels {
            if level.quantity <= 0 {
                return Err(Error::Validation(format!(
                    "{ticker}: non-positive quantity {} at {side} {}",
                    level.quantity, level.price_cents
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub const fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    #[must_use]
    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Resting bids for a side, best (highest) first.
    #[must_use]
    pub fn bids(&self, side: Side) -> &[Level] {
        match side {
            Side::Yes => &self.yes_bids,
            Side::No => &self.no_bids,
        }
    }

    /// Implied asks for a side: the opposite side's bids inverted to
    /// `100 - price`, best (lowest) first.
    #[must_use]
    pub fn implied_asks(&self, side: Side) -> Vec<Level> {
        self.bids(side.opposite())
            .iter()
            .map(|l| Level::new(100 - l.price_cents, l.quantity))
            .collect()
    }

    #[must_use]
    pub fn best_bid(&self, side: Side) -> Option<Level> {
        self.bids(side).first().copied()
    }

    #[must_use]
    pub fn best_ask(&self, side: Side) -> Option<Level> {
        self.bids(side.opposite())
            .first()
            .map(|l| Level::new(100 - l.price_cents, l.quantity))
    }

    /// Midpoint in cents: `(best_yes_bid + (100 - best_no_bid)) / 2`.
    #[must_use]
    pub fn midpoint_cents(&self) -> Option<f64> {
        let yes = self.best_bid(Side::Yes)?.price_cents;
        let no = self.best_bid(Side::No)?.price_cents;
        Some((yes + (100 - no)) as f64 / 2.0)
    }

    /// Spread in cents: `100 - best_yes_bid - best_no_bid`.
    #[must_use]
    pub fn spread_cents(&self) -> Option<i64> {
        let yes = self.best_bid(Side::Yes)?.price_cents;
        let no = self.best_bid(Side::No)?.price_cents;
        Some(100 - yes - no)
    }

    /// `best_yes_bid + best_no_bid > 100` means buying both sides locks in
    /// a payout below cost for the counterparties: an arbitrage signal.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        self.spread_cents().is_some_and(|s| s < 0)
    }

    /// Total resting contracts on a side.
    #[must_use]
    pub fn total_quantity(&self, side: Side) -> i64 {
        self.bids(side).iter().map(|l| l.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.yes_bids.is_empty() && self.no_bids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(yes: &[(i64, i64)], no: &[(i64, i64)]) -> OrderbookSnapshot {
        OrderbookSnapshot::new(
            Ticker::from("MKT-1"),
            yes.iter().map(|&(p, q)| Level::new(p, q)).collect(),
            no.iter().map(|&(p, q)| Level::new(p, q)).collect(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn bids_are_sorted_best_first() {
        let b = book(&[(40, 10), (42, 5), (41, 7)], &[]);
        let prices: Vec<i64> = b.bids(Side::Yes).iter().map(|l| l.price_cents).collect();
        assert_eq!(prices, vec![42, 41, 40]);
    }

    #[test]
    fn implied_asks_invert_opposite_bids() {
        // NO bids at 53/54/55 imply YES asks at 47/46/45, best-first = 45.
        let b = book(&[], &[(53, 100), (54, 100), (55, 100)]);
        let asks = b.implied_asks(Side::Yes);
        let prices: Vec<i64> = asks.iter().map(|l| l.price_cents).collect();
        assert_eq!(prices, vec![45, 46, 47]);
        assert_eq!(b.best_ask(Side::Yes), Some(Level::new(45, 100)));
    }

    #[test]
    fn midpoint_and_spread_from_both_sides() {
        let b = book(&[(40, 10)], &[(56, 10)]);
        assert_eq!(b.midpoint_cents(), Some(42.0));
        assert_eq!(b.spread_cents(), Some(4));
    }

    #[test]
    fn crossed_book_is_an_arbitrage_signal() {
        // yes 40 + no 56 = 96: fine. yes 52 + no 53 = 105: crossed.
        assert!(!book(&[(40, 10)], &[(56, 10)]).is_crossed());
        assert!(book(&[(52, 10)], &[(53, 10)]).is_crossed());
    }

    #[test]
    fn rejects_duplicate_price_levels() {
        let err = OrderbookSnapshot::new(
            Ticker::from("MKT-1"),
            vec![Level::new(40, 10), Level::new(40, 5)],
            vec![],
            Utc::now(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let err = OrderbookSnapshot::new(
            Ticker::from("MKT-1"),
            vec![Level::new(40, 0)],
            vec![],
            Utc::now(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn empty_book_has_no_quotes() {
        let b = book(&[], &[]);
        assert!(b.is_empty());
        assert_eq!(b.midpoint_cents(), None);
        assert_eq!(b.best_ask(Side::Yes), None);
    }
}
