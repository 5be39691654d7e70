//! Persisted time-series records: price snapshots and settlements.

use chrono::{DateTime, Utc};

use super::id::Ticker;
use super::price::PriceUnits;

/// One row of the append-only price history for a ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub ticker: Ticker,
    pub snapshot_ts: DateTime<Utc>,
    pub yes_bid: Option<PriceUnits>,
    pub yes_ask: Option<PriceUnits>,
    pub volume: i64,
    pub open_interest: i64,
    pub liquidity: Option<i64>,
}

impl PriceSnapshot {
    /// Quote midpoint as implied probability.
    #[must_use]
    pub fn midpoint(&self) -> Option<f64> {
        match (self.yes_bid, self.yes_ask) {
            (Some(bid), Some(ask)) => Some((bid.probability() + ask.probability()) / 2.0),
            _ => None,
        }
    }
}

/// Terminal settlement record for a market. Created once, immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub ticker: Ticker,
    pub settled_at: DateTime<Utc>,
    /// 1 when the market settled YES, 0 when NO.
    pub settlement_value: i32,
    /// When the underlying outcome was determined, if reported.
    pub determined_at: Option<DateTime<Utc>>,
}

impl Settlement {
    /// Settlement as the realized outcome probability (0.0 or 1.0).
    #[must_use]
    pub fn outcome(&self) -> f64 {
        f64::from(self.settlement_value)
    }

    /// Payout per contract for the given side, in price units.
    #[must_use]
    pub fn payout(&self, side: super::orderbook::Side) -> PriceUnits {
        use super::orderbook::Side;
        let yes_pays = self.settlement_value == 1;
        match (side, yes_pays) {
            (Side::Yes, true) | (Side::No, false) => PriceUnits::DOLLAR,
            _ => PriceUnits::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::Side;

    #[test]
    fn settlement_payout_per_side() {
        let s = Settlement {
            ticker: Ticker::from("MKT-1"),
            settled_at: Utc::now(),
            settlement_value: 1,
            determined_at: None,
        };
        assert_eq!(s.payout(Side::Yes), PriceUnits::DOLLAR);
        assert_eq!(s.payout(Side::No), PriceUnits::ZERO);
        assert!((s.outcome() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_midpoint_requires_both_quotes() {
        let snap = PriceSnapshot {
            ticker: Ticker::from("MKT-1"),
            snapshot_ts: Utc::now(),
            yes_bid: Some(PriceUnits::from_cents(40)),
            yes_ask: None,
            volume: 0,
            open_interest: 0,
            liquidity: None,
        };
        assert_eq!(snap.midpoint(), None);
    }
}
