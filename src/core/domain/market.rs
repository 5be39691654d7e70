//! Market, event, and series domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{EventTicker, SeriesTicker, Ticker};
use super::price::PriceUnits;

/// Lifecycle status of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Unopened,
    Open,
    Paused,
    Closed,
    Settled,
}

impl MarketStatus {
    /// Parse the wire status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unopened" | "initialized" => Some(Self::Unopened),
            "open" | "active" => Some(Self::Open),
            "paused" | "inactive" => Some(Self::Paused),
            "closed" => Some(Self::Closed),
            "settled" | "finalized" => Some(Self::Settled),
            _ => None,
        }
    }

    /// Whether the market can still trade.
    #[must_use]
    pub const fn is_trading(&self) -> bool {
        matches!(self, Self::Open)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unopened => "unopened",
            Self::Open => "open",
            Self::Paused => "paused",
            Self::Closed => "closed",
            Self::Settled => "settled",
        }
    }
}

/// A binary market. Quotes are best YES bid/ask; the NO side is implied.
///
/// Mutated only by ingestion writes; elsewhere this is a frozen value object.
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub ticker: Ticker,
    pub event_ticker: EventTicker,
    pub series_ticker: Option<SeriesTicker>,
    pub title: String,
    pub status: MarketStatus,
    pub created_time: Option<DateTime<Utc>>,
    pub open_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub settlement_time: Option<DateTime<Utc>>,
    pub yes_bid: Option<PriceUnits>,
    pub yes_ask: Option<PriceUnits>,
    pub volume: i64,
    pub volume_24h: i64,
    pub open_interest: i64,
    /// Notional liquidity reported by the exchange. Negative wire sentinels
    /// are normalized to `None` at the wire boundary.
    pub liquidity: Option<i64>,
    pub is_multivariate: bool,
}

impl Market {
    /// Implied NO bid: `$1 - yes_ask`.
    #[must_use]
    pub fn no_bid(&self) -> Option<PriceUnits> {
        self.yes_ask.map(|p| p.complement())
    }

    /// Implied NO ask: `$1 - yes_bid`.
    #[must_use]
    pub fn no_ask(&self) -> Option<PriceUnits> {
        self.yes_bid.map(|p| p.complement())
    }

    /// Quote midpoint as implied probability, when both sides are quoted.
    #[must_use]
    pub fn midpoint(&self) -> Option<f64> {
        match (self.yes_bid, self.yes_ask) {
            (Some(bid), Some(ask)) => Some((bid.probability() + ask.probability()) / 2.0),
            _ => None,
        }
    }

    /// Quoted spread in cents.
    #[must_use]
    pub fn spread_cents(&self) -> Option<f64> {
        match (self.yes_bid, self.yes_ask) {
            (Some(bid), Some(ask)) => Some(ask.cents() - bid.cents()),
            _ => None,
        }
    }

    /// A `(0, 100)` quote is a placeholder before price discovery; `(0, 0)`
    /// means no quotes at all. Both count as unpriced.
    #[must_use]
    pub fn is_priced(&self) -> bool {
        match (self.yes_bid, self.yes_ask) {
            (Some(bid), Some(ask)) => {
                !(bid == PriceUnits::ZERO
                    && (ask == PriceUnits::DOLLAR || ask == PriceUnits::ZERO))
            }
            _ => false,
        }
    }
}

/// An event groups markets over a shared outcome space.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub ticker: EventTicker,
    pub series_ticker: Option<SeriesTicker>,
    pub title: String,
    pub category: Option<String>,
    /// Multivariate events are discovered through a separate endpoint; their
    /// markets are joint outcome combinations.
    pub multivariate: bool,
}

/// A series groups recurring events.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub ticker: SeriesTicker,
    pub title: String,
    pub frequency: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(bid: Option<i64>, ask: Option<i64>) -> Market {
        Market {
            ticker: Ticker::from("MKT-1"),
            event_ticker: EventTicker::from("EVT-1"),
            series_ticker: None,
            title: "Test market".into(),
            status: MarketStatus::Open,
            created_time: None,
            open_time: None,
            close_time: None,
            settlement_time: None,
            yes_bid: bid.map(PriceUnits::from_cents),
            yes_ask: ask.map(PriceUnits::from_cents),
            volume: 0,
            volume_24h: 0,
            open_interest: 0,
            liquidity: None,
            is_multivariate: false,
        }
    }

    #[test]
    fn implied_no_side_complements_yes_quotes() {
        let m = market(Some(40), Some(44));
        assert_eq!(m.no_bid(), Some(PriceUnits::from_cents(56)));
        assert_eq!(m.no_ask(), Some(PriceUnits::from_cents(60)));
    }

    #[test]
    fn midpoint_and_spread() {
        let m = market(Some(40), Some(44));
        assert!((m.midpoint().unwrap() - 0.42).abs() < 1e-12);
        assert!((m.spread_cents().unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn placeholder_quotes_are_unpriced() {
        assert!(!market(Some(0), Some(100)).is_priced());
        assert!(!market(Some(0), Some(0)).is_priced());
        assert!(!market(None, None).is_priced());
        assert!(market(Some(40), Some(44)).is_priced());
    }

    #[test]
    fn status_parses_wire_aliases() {
        assert_eq!(MarketStatus::parse("active"), Some(MarketStatus::Open));
        assert_eq!(MarketStatus::parse("finalized"), Some(MarketStatus::Settled));
        assert_eq!(MarketStatus::parse("bogus"), None);
    }

    #[test]
    fn only_open_markets_trade() {
        assert!(MarketStatus::Open.is_trading());
        assert!(!MarketStatus::Settled.is_trading());
        assert!(!MarketStatus::Paused.is_trading());
    }
}
