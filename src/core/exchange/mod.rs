//! Exchange access: the `MarketApi` seam, the signed Kalshi client behind it,
//! tiered rate limiting, and cursor pagination.

pub mod kalshi;
pub mod paging;
pub mod rate_limit;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::domain::{
    Event, EventTicker, Fill, FillAction, Market, MarketStatus, OrderId, OrderbookSnapshot,
    PriceUnits, SeriesTicker, Side, Ticker,
};
use crate::error::{Error, Result};
use paging::Page;

/// Multivariate handling for market discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultivariateFilter {
    /// Return both univariate and multivariate markets.
    Include,
    /// Return only multivariate markets.
    Only,
    /// Drop multivariate markets.
    #[default]
    Exclude,
}

/// Server-side and client-side filters for market discovery.
#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    pub status: Option<MarketStatus>,
    pub tickers: Vec<Ticker>,
    pub event_ticker: Option<EventTicker>,
    pub series_ticker: Option<SeriesTicker>,
    pub min_close_ts: Option<DateTime<Utc>>,
    pub max_close_ts: Option<DateTime<Utc>>,
    pub multivariate: MultivariateFilter,
}

impl MarketFilter {
    /// Filter for currently open markets.
    #[must_use]
    pub fn open() -> Self {
        Self {
            status: Some(MarketStatus::Open),
            ..Self::default()
        }
    }

    /// Apply the multivariate policy client-side.
    #[must_use]
    pub fn admits(&self, market: &Market) -> bool {
        match self.multivariate {
            MultivariateFilter::Include => true,
            MultivariateFilter::Only => market.is_multivariate,
            MultivariateFilter::Exclude => !market.is_multivariate,
        }
    }
}

/// Candlestick interval supported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleInterval {
    Minute,
    Hour,
    Day,
}

impl CandleInterval {
    /// Interval length in minutes, as the API encodes it.
    #[must_use]
    pub const fn minutes(&self) -> i64 {
        match self {
            Self::Minute => 1,
            Self::Hour => 60,
            Self::Day => 1440,
        }
    }
}

/// One OHLC candle of a market's YES price.
#[derive(Debug, Clone, PartialEq)]
pub struct Candlestick {
    pub end_period_ts: DateTime<Utc>,
    pub open: Option<PriceUnits>,
    pub high: Option<PriceUnits>,
    pub low: Option<PriceUnits>,
    pub close: Option<PriceUnits>,
    pub volume: i64,
    pub open_interest: i64,
}

/// Account cash balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub available: PriceUnits,
}

/// A position as reported by the exchange (not the FIFO-derived view).
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangePosition {
    pub ticker: Ticker,
    /// Signed contract count; positive is YES exposure.
    pub position: i64,
    pub market_exposure: PriceUnits,
    pub realized_pnl: PriceUnits,
    pub fees_paid: PriceUnits,
}

/// A resting or historical order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub ticker: Ticker,
    pub side: Side,
    pub action: FillAction,
    pub status: String,
    pub yes_price_cents: i64,
    pub count: i64,
    pub remaining_count: i64,
    pub created_time: Option<DateTime<Utc>>,
}

/// Specification for a new order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSpec {
    pub ticker: Ticker,
    pub side: Side,
    pub action: FillAction,
    pub count: i64,
    /// Limit price in integer cents; must lie in `1..=99`.
    pub price_cents: i64,
    pub client_order_id: String,
}

impl OrderSpec {
    /// Validate the order independent of transport.
    pub fn validate(&self) -> Result<()> {
        if !(1..=99).contains(&self.price_cents) {
            return Err(Error::Validation(format!(
                "order price {} outside 1..=99 cents",
                self.price_cents
            )));
        }
        if self.count <= 0 {
            return Err(Error::Validation(format!(
                "order count {} must be positive",
                self.count
            )));
        }
        Ok(())
    }
}

/// Response to order placement. Dry runs synthesize this locally with
/// `order_id == "DRY_RUN"` and never touch the network.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub status: String,
    pub spec: OrderSpec,
}

/// A settlement record from the authenticated portfolio stream.
pub use crate::core::domain::Settlement;

/// The exchange seam consumed by the scheduler, scanner, liquidity CLI, and
/// orchestrator. Implemented by [`kalshi::KalshiClient`]; test doubles live
/// in the testkit.
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// One page of market discovery. Page size is capped at 1000.
    async fn markets_page(
        &self,
        filter: &MarketFilter,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<Page<Market>>;

    /// Fetch a single market by ticker.
    async fn market(&self, ticker: &Ticker) -> Result<Market>;

    /// One page of event discovery. Page size is capped at 200.
    async fn events_page(&self, cursor: Option<String>, limit: u32) -> Result<Page<Event>>;

    /// Current orderbook. `depth == 0` requests all levels.
    async fn orderbook(&self, ticker: &Ticker, depth: u32) -> Result<OrderbookSnapshot>;

    /// Candlesticks for a market over a closed time range. Batch capped at 100.
    async fn candlesticks(
        &self,
        series: &SeriesTicker,
        ticker: &Ticker,
        interval: CandleInterval,
        start_ts: DateTime<Utc>,
        end_ts: DateTime<Utc>,
    ) -> Result<Vec<Candlestick>>;

    /// One page of the authenticated settlements stream.
    async fn settlements_page(&self, cursor: Option<String>, limit: u32) -> Result<Page<Settlement>>;

    /// One page of the authenticated fills stream. Page size capped at 200.
    async fn fills_page(&self, cursor: Option<String>, limit: u32) -> Result<Page<Fill>>;

    /// Exchange-reported positions.
    async fn positions(&self) -> Result<Vec<ExchangePosition>>;

    /// Account balance.
    async fn balance(&self) -> Result<Balance>;

    /// One page of orders.
    async fn orders_page(&self, cursor: Option<String>, limit: u32) -> Result<Page<OrderRecord>>;

    /// Place (or dry-run) an order.
    async fn create_order(&self, spec: &OrderSpec, dry_run: bool) -> Result<OrderResponse>;

    /// One page of multivariate event collections. Separate discovery path.
    async fn multivariate_collections_page(
        &self,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<Page<Event>>;

    /// Resolve the market ticker for a selection within a multivariate
    /// collection.
    async fn lookup_multivariate_ticker(
        &self,
        collection: &EventTicker,
        selected: &[Ticker],
    ) -> Result<Ticker>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_spec_price_bounds() {
        let mut spec = OrderSpec {
            ticker: Ticker::from("MKT-1"),
            side: Side::Yes,
            action: FillAction::Buy,
            count: 10,
            price_cents: 50,
            client_order_id: "c-1".into(),
        };
        assert!(spec.validate().is_ok());

        spec.price_cents = 0;
        assert!(spec.validate().is_err());
        spec.price_cents = 100;
        assert!(spec.validate().is_err());
        spec.price_cents = 99;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn filter_admits_by_multivariate_policy() {
        let mut market = crate::testkit::market("MKT-1", Some(40), Some(44));
        let mut filter = MarketFilter::default();
        assert!(filter.admits(&market));

        market.is_multivariate = true;
        assert!(!filter.admits(&market));

        filter.multivariate = MultivariateFilter::Only;
        assert!(filter.admits(&market));

        filter.multivariate = MultivariateFilter::Include;
        assert!(filter.admits(&market));
    }
}
