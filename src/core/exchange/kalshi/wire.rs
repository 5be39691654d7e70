//! Wire payload models and their normalization into domain types.
//!
//! This is the only layer that sees the deprecated integer-cent price fields
//! next to their dollar-string replacements; both parse to the same
//! canonical [`PriceUnits`] representation. Unknown fields are ignored.
//! A payload that fails validation fails that item only; batch conversion
//! continues with the next item.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::core::domain::{
    Event, EventTicker, Fill, FillAction, FillId, Level, Market, MarketStatus, OrderId,
    OrderbookSnapshot, PriceUnits, SeriesTicker, Settlement, Side, Ticker,
};
use crate::core::exchange::{Balance, Candlestick, ExchangePosition, OrderRecord};
use crate::error::{Error, Result};

/// Parse an RFC 3339 timestamp; naive timestamps fail validation.
pub fn parse_ts(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Validation(format!("{field}: bad timestamp {raw:?}: {e}")))
}

fn parse_opt_ts(field: &str, raw: Option<&String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(field, s)).transpose()
}

/// Normalize a dual-representation price field, preferring the dollar string.
fn price_field(
    field: &str,
    cents: Option<i64>,
    dollars: Option<&String>,
) -> Result<Option<PriceUnits>> {
    match (dollars, cents) {
        (Some(s), _) => PriceUnits::parse_dollars(s)
            .map(Some)
            .map_err(|e| Error::Validation(format!("{field}: {e}"))),
        (None, Some(c)) => Ok(Some(PriceUnits::from_cents(c))),
        (None, None) => Ok(None),
    }
}

// --- Markets -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MarketsResponse {
    #[serde(default)]
    pub markets: Vec<WireMarket>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SingleMarketResponse {
    pub market: WireMarket,
}

#[derive(Debug, Deserialize)]
pub struct WireMarket {
    pub ticker: String,
    pub event_ticker: String,
    #[serde(default)]
    pub market_type: Option<String>,
    #[serde(default)]
    pub series_ticker: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub status: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
    #[serde(default)]
    pub settlement_time: Option<String>,
    // Deprecated integer-cent quotes and their dollar-string replacements.
    #[serde(default)]
    pub yes_bid: Option<i64>,
    #[serde(default)]
    pub yes_bid_dollars: Option<String>,
    #[serde(default)]
    pub yes_ask: Option<i64>,
    #[serde(default)]
    pub yes_ask_dollars: Option<String>,
    #[serde(default)]
    pub volume: Option<i64>,
    #[serde(default)]
    pub volume_24h: Option<i64>,
    #[serde(default)]
    pub open_interest: Option<i64>,
    #[serde(default)]
    pub liquidity: Option<i64>,
    #[serde(default)]
    pub liquidity_dollars: Option<String>,
}

impl WireMarket {
    /// Validate and normalize into the frozen domain market.
    pub fn into_domain(self) -> Result<Market> {
        let status = MarketStatus::parse(&self.status).ok_or_else(|| {
            Error::Validation(format!("{}: unknown status {:?}", self.ticker, self.status))
        })?;

        let yes_bid = price_field("yes_bid", self.yes_bid, self.yes_bid_dollars.as_ref())?;
        let yes_ask = price_field("yes_ask", self.yes_ask, self.yes_ask_dollars.as_ref())?;

        if let (Some(bid), Some(ask)) = (yes_bid, yes_ask) {
            let ok = PriceUnits::ZERO <= bid && bid <= ask && ask <= PriceUnits::DOLLAR;
            if !ok {
                return Err(Error::Validation(format!(
                    "{}: quote invariant violated (bid {bid}, ask {ask})",
                    self.ticker
                )));
            }
        }

        // Upstream uses a negative liquidity sentinel for "unknown".
        let liquidity = match price_field(
            "liquidity",
            self.liquidity,
            self.liquidity_dollars.as_ref(),
        ) {
            Ok(v) => v.map(|p| PriceUnits::units(&p)).filter(|u| {
                if *u < 0 {
                    warn!(ticker = %self.ticker, "negative liquidity sentinel normalized to null");
                    false
                } else {
                    true
                }
            }),
            // A malformed dollar string is a validation error, but the
            // sentinel arrives through the integer field.
            Err(e) => return Err(e),
        };

        Ok(Market {
            ticker: Ticker::from(self.ticker),
            event_ticker: EventTicker::from(self.event_ticker),
            series_ticker: self.series_ticker.map(SeriesTicker::from),
            title: self.title.unwrap_or_default(),
            status,
            created_time: parse_opt_ts("created_time", self.created_time.as_ref())?,
            open_time: parse_opt_ts("open_time", self.open_time.as_ref())?,
            close_time: parse_opt_ts("close_time", self.close_time.as_ref())?,
            settlement_time: parse_opt_ts("settlement_time", self.settlement_time.as_ref())?,
            yes_bid,
            yes_ask,
            volume: self.volume.unwrap_or(0),
            volume_24h: self.volume_24h.unwrap_or(0),
            open_interest: self.open_interest.unwrap_or(0),
            liquidity,
            is_multivariate: self.market_type.as_deref() == Some("multivariate"),
        })
    }
}

/// Convert a batch, skipping invalid items with a warning per item.
pub fn markets_into_domain(wire: Vec<WireMarket>) -> Vec<Market> {
    wire.into_iter()
        .filter_map(|m| {
            let ticker = m.ticker.clone();
            match m.into_domain() {
                Ok(market) => Some(market),
                Err(e) => {
                    warn!(ticker, error = %e, "skipping invalid market payload");
                    None
                }
            }
        })
        .collect()
}

// --- Events ------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<WireEvent>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionsResponse {
    #[serde(default)]
    pub multivariate_event_collections: Vec<WireEvent>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireEvent {
    #[serde(alias = "collection_ticker")]
    pub event_ticker: String,
    #[serde(default)]
    pub series_ticker: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_multivariate: Option<bool>,
}

impl WireEvent {
    #[must_use]
    pub fn into_domain(self, multivariate: bool) -> Event {
        Event {
            ticker: EventTicker::from(self.event_ticker),
            series_ticker: self.series_ticker.map(SeriesTicker::from),
            title: self.title.unwrap_or_default(),
            category: self.category,
            multivariate: self.is_multivariate.unwrap_or(multivariate),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LookupTickersResponse {
    pub market_ticker: String,
}

// --- Orderbook ---------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OrderbookResponse {
    pub orderbook: WireOrderbook,
}

#[derive(Debug, Deserialize)]
pub struct WireOrderbook {
    #[serde(default)]
    pub yes: Option<Vec<(i64, i64)>>,
    #[serde(default)]
    pub no: Option<Vec<(i64, i64)>>,
}

impl WireOrderbook {
    pub fn into_domain(self, ticker: Ticker, fetched_at: DateTime<Utc>) -> Result<OrderbookSnapshot> {
        let to_levels = |side: Option<Vec<(i64, i64)>>| -> Vec<Level> {
            side.unwrap_or_default()
                .into_iter()
                .map(|(p, q)| Level::new(p, q))
                .collect()
        };
        OrderbookSnapshot::new(ticker, to_levels(self.yes), to_levels(self.no), fetched_at)
    }
}

// --- Candlesticks ------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CandlesticksResponse {
    #[serde(default)]
    pub candlesticks: Vec<WireCandle>,
}

#[derive(Debug, Deserialize)]
pub struct WireCandle {
    pub end_period_ts: i64,
    #[serde(default)]
    pub price: Option<WireOhlc>,
    #[serde(default)]
    pub volume: Option<i64>,
    #[serde(default)]
    pub open_interest: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WireOhlc {
    #[serde(default)]
    pub open: Option<i64>,
    #[serde(default)]
    pub open_dollars: Option<String>,
    #[serde(default)]
    pub high: Option<i64>,
    #[serde(default)]
    pub high_dollars: Option<String>,
    #[serde(default)]
    pub low: Option<i64>,
    #[serde(default)]
    pub low_dollars: Option<String>,
    #[serde(default)]
    pub close: Option<i64>,
    #[serde(default)]
    pub close_dollars: Option<String>,
}

impl WireCandle {
    pub fn into_domain(self) -> Result<Candlestick> {
        let ts = DateTime::<Utc>::from_timestamp(self.end_period_ts, 0).ok_or_else(|| {
            Error::Validation(format!("candlestick ts out of range: {}", self.end_period_ts))
        })?;
        let (open, high, low, close) = match self.price {
            Some(p) => (
                price_field("open", p.open, p.open_dollars.as_ref())?,
                price_field("high", p.high, p.high_dollars.as_ref())?,
                price_field("low", p.low, p.low_dollars.as_ref())?,
                price_field("close", p.close, p.close_dollars.as_ref())?,
            ),
            None => (None, None, None, None),
        };
        Ok(Candlestick {
            end_period_ts: ts,
            open,
            high,
            low,
            close,
            volume: self.volume.unwrap_or(0),
            open_interest: self.open_interest.unwrap_or(0),
        })
    }
}

// --- Settlements -------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SettlementsResponse {
    #[serde(default)]
    pub settlements: Vec<WireSettlement>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireSettlement {
    pub ticker: String,
    pub market_result: String,
    pub settled_time: String,
    #[serde(default)]
    pub determined_time: Option<String>,
}

impl WireSettlement {
    pub fn into_domain(self) -> Result<Settlement> {
        let settlement_value = match self.market_result.as_str() {
            "yes" => 1,
            "no" => 0,
            other => {
                return Err(Error::Validation(format!(
                    "{}: unknown market_result {other:?}",
                    self.ticker
                )))
            }
        };
        Ok(Settlement {
            ticker: Ticker::from(self.ticker),
            settled_at: parse_ts("settled_time", &self.settled_time)?,
            settlement_value,
            determined_at: parse_opt_ts("determined_time", self.determined_time.as_ref())?,
        })
    }
}

// --- Fills -------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FillsResponse {
    #[serde(default)]
    pub fills: Vec<WireFill>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireFill {
    #[serde(alias = "trade_id")]
    pub fill_id: String,
    pub ticker: String,
    pub side: String,
    pub action: String,
    pub count: i64,
    #[serde(default)]
    pub yes_price: Option<i64>,
    #[serde(default)]
    pub yes_price_dollars: Option<String>,
    #[serde(default)]
    pub no_price: Option<i64>,
    #[serde(default)]
    pub no_price_dollars: Option<String>,
    #[serde(default)]
    pub fee: Option<i64>,
    #[serde(default)]
    pub fee_dollars: Option<String>,
    pub created_time: String,
}

impl WireFill {
    pub fn into_domain(self) -> Result<Fill> {
        let side = match self.side.as_str() {
            "yes" => Side::Yes,
            "no" => Side::No,
            other => {
                return Err(Error::Validation(format!(
                    "{}: unknown side {other:?}",
                    self.fill_id
                )))
            }
        };
        let action = FillAction::parse(&self.action).ok_or_else(|| {
            Error::Validation(format!("{}: unknown action {:?}", self.fill_id, self.action))
        })?;
        if self.count <= 0 {
            return Err(Error::Validation(format!(
                "{}: non-positive count {}",
                self.fill_id, self.count
            )));
        }

        let price = match side {
            Side::Yes => price_field("yes_price", self.yes_price, self.yes_price_dollars.as_ref())?,
            Side::No => price_field("no_price", self.no_price, self.no_price_dollars.as_ref())?,
        }
        .ok_or_else(|| {
            Error::Validation(format!("{}: fill missing execution price", self.fill_id))
        })?;

        let fees = price_field("fee", self.fee, self.fee_dollars.as_ref())?.unwrap_or(PriceUnits::ZERO);

        Ok(Fill {
            fill_id: FillId::from(self.fill_id),
            ticker: Ticker::from(self.ticker),
            side,
            action,
            count: self.count,
            price,
            fees,
            trade_ts: parse_ts("created_time", &self.created_time)?,
        })
    }
}

// --- Portfolio ---------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BalanceResponse {
    #[serde(default)]
    pub balance: Option<i64>,
    #[serde(default)]
    pub balance_dollars: Option<String>,
}

impl BalanceResponse {
    pub fn into_domain(self) -> Result<Balance> {
        let available = price_field("balance", self.balance, self.balance_dollars.as_ref())?
            .unwrap_or(PriceUnits::ZERO);
        Ok(Balance { available })
    }
}

#[derive(Debug, Deserialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub market_positions: Vec<WirePosition>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WirePosition {
    pub ticker: String,
    pub position: i64,
    #[serde(default)]
    pub market_exposure: Option<i64>,
    #[serde(default)]
    pub market_exposure_dollars: Option<String>,
    #[serde(default)]
    pub realized_pnl: Option<i64>,
    #[serde(default)]
    pub realized_pnl_dollars: Option<String>,
    #[serde(default)]
    pub fees_paid: Option<i64>,
    #[serde(default)]
    pub fees_paid_dollars: Option<String>,
}

impl WirePosition {
    pub fn into_domain(self) -> Result<ExchangePosition> {
        Ok(ExchangePosition {
            position: self.position,
            market_exposure: price_field(
                "market_exposure",
                self.market_exposure,
                self.market_exposure_dollars.as_ref(),
            )?
            .unwrap_or(PriceUnits::ZERO),
            realized_pnl: price_field(
                "realized_pnl",
                self.realized_pnl,
                self.realized_pnl_dollars.as_ref(),
            )?
            .unwrap_or(PriceUnits::ZERO),
            fees_paid: price_field(
                "fees_paid",
                self.fees_paid,
                self.fees_paid_dollars.as_ref(),
            )?
            .unwrap_or(PriceUnits::ZERO),
            ticker: Ticker::from(self.ticker),
        })
    }
}

// --- Orders ------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<WireOrder>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderResponse {
    pub order: WireOrder,
}

#[derive(Debug, Deserialize)]
pub struct WireOrder {
    pub order_id: String,
    pub ticker: String,
    pub side: String,
    pub action: String,
    pub status: String,
    #[serde(default)]
    pub yes_price: Option<i64>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub remaining_count: Option<i64>,
    #[serde(default)]
    pub created_time: Option<String>,
}

impl WireOrder {
    pub fn into_domain(self) -> Result<OrderRecord> {
        let side = match self.side.as_str() {
            "yes" => Side::Yes,
            "no" => Side::No,
            other => {
                return Err(Error::Validation(format!(
                    "{}: unknown side {other:?}",
                    self.order_id
                )))
            }
        };
        let action = FillAction::parse(&self.action).ok_or_else(|| {
            Error::Validation(format!(
                "{}: unknown action {:?}",
                self.order_id, self.action
            ))
        })?;
        Ok(OrderRecord {
            side,
            action,
            status: self.status,
            yes_price_cents: self.yes_price.unwrap_or(0),
            count: self.count.unwrap_or(0),
            remaining_count: self.remaining_count.unwrap_or(0),
            created_time: parse_opt_ts("created_time", self.created_time.as_ref())?,
            ticker: Ticker::from(self.ticker),
            order_id: OrderId::from(self.order_id),
        })
    }
}

// --- Errors ------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Best-effort decode of a server error body into a human message.
#[must_use]
pub fn decode_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed
            .error
            .and_then(|e| e.message.or(e.code))
            .or(parsed.message)
            .unwrap_or_else(|| body.trim().to_string()),
        Err(_) => body.trim().to_string(),
    }
}
