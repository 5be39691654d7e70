//! A scripted `MarketApi` double.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::domain::{
    Event, EventTicker, Fill, Market, OrderbookSnapshot, SeriesTicker, Settlement, Ticker,
};
use crate::core::exchange::paging::Page;
use crate::core::exchange::{
    Balance, CandleInterval, Candlestick, ExchangePosition, MarketApi, MarketFilter, OrderRecord,
    OrderResponse, OrderSpec,
};
use crate::error::{Error, Result};

/// In-memory `MarketApi` whose responses are scripted per test.
#[derive(Default)]
pub struct ScriptedMarketApi {
    pub markets: Mutex<HashMap<Ticker, Market>>,
    pub books: Mutex<HashMap<Ticker, OrderbookSnapshot>>,
    /// Pages served by `markets_page`, in order.
    pub market_pages: Mutex<Vec<Page<Market>>>,
    pub fill_pages: Mutex<Vec<Page<Fill>>>,
    pub settlement_pages: Mutex<Vec<Page<Settlement>>>,
    pub event_pages: Mutex<Vec<Page<Event>>>,
    /// When set, `markets_page` fails after serving this many pages.
    pub fail_markets_after: Option<u32>,
    pub calls: AtomicU32,
}

impl ScriptedMarketApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_market(&self, market: Market) {
        self.markets.lock().insert(market.ticker.clone(), market);
    }

    pub fn insert_book(&self, book: OrderbookSnapshot) {
        self.books.lock().insert(book.ticker().clone(), book);
    }

    pub fn push_market_pages(&self, pages: Vec<Page<Market>>) {
        *self.market_pages.lock() = pages;
    }

    pub fn push_fill_pages(&self, pages: Vec<Page<Fill>>) {
        *self.fill_pages.lock() = pages;
    }

    pub fn push_settlement_pages(&self, pages: Vec<Page<Settlement>>) {
        *self.settlement_pages.lock() = pages;
    }

    fn serve<T: Clone>(pages: &Mutex<Vec<Page<T>>>, cursor: Option<String>) -> Page<T> {
        let pages = pages.lock();
        if pages.is_empty() {
            return Page::last(Vec::new());
        }
        let index = cursor
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0)
            .min(pages.len() - 1);
        pages[index].clone()
    }
}

/// Script pages with numeric cursors `"1"`, `"2"`, ... for `n` pages.
#[must_use]
pub fn numbered_pages<T: Clone>(mut batches: Vec<Vec<T>>) -> Vec<Page<T>> {
    let total = batches.len();
    batches
        .drain(..)
        .enumerate()
        .map(|(i, items)| {
            if i + 1 < total {
                Page::new(items, Some((i + 1).to_string()))
            } else {
                Page::last(items)
            }
        })
        .collect()
}

#[async_trait]
impl MarketApi for ScriptedMarketApi {
    async fn markets_page(
        &self,
        filter: &MarketFilter,
        cursor: Option<String>,
        _limit: u32,
    ) -> Result<Page<Market>> {
        let served = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(after) = self.fail_markets_after {
            if served >= after {
                return Err(Error::Transport("scripted mid-stream failure".into()));
            }
        }
        let page = Self::serve(&self.market_pages, cursor);
        Ok(Page {
            items: page.items.into_iter().filter(|m| filter.admits(m)).collect(),
            cursor: page.cursor,
        })
    }

    async fn market(&self, ticker: &Ticker) -> Result<Market> {
        self.markets
            .lock()
            .get(ticker)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no market {ticker}")))
    }

    async fn events_page(&self, cursor: Option<String>, _limit: u32) -> Result<Page<Event>> {
        Ok(Self::serve(&self.event_pages, cursor))
    }

    async fn orderbook(&self, ticker: &Ticker, _depth: u32) -> Result<OrderbookSnapshot> {
        self.books
            .lock()
            .get(ticker)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no book for {ticker}")))
    }

    async fn candlesticks(
        &self,
        _series: &SeriesTicker,
        _ticker: &Ticker,
        _interval: CandleInterval,
        _start_ts: DateTime<Utc>,
        _end_ts: DateTime<Utc>,
    ) -> Result<Vec<Candlestick>> {
        Ok(Vec::new())
    }

    async fn settlements_page(
        &self,
        cursor: Option<String>,
        _limit: u32,
    ) -> Result<Page<Settlement>> {
        Ok(Self::serve(&self.settlement_pages, cursor))
    }

    async fn fills_page(&self, cursor: Option<String>, _limit: u32) -> Result<Page<Fill>> {
        Ok(Self::serve(&self.fill_pages, cursor))
    }

    async fn positions(&self) -> Result<Vec<ExchangePosition>> {
        Ok(Vec::new())
    }

    async fn balance(&self) -> Result<Balance> {
        Ok(Balance {
            available: crate::core::domain::PriceUnits::ZERO,
        })
    }

    async fn orders_page(&self, _cursor: Option<String>, _limit: u32) -> Result<Page<OrderRecord>> {
        Ok(Page::last(Vec::new()))
    }

    async fn create_order(&self, spec: &OrderSpec, dry_run: bool) -> Result<OrderResponse> {
        spec.validate()?;
        Ok(OrderResponse {
            order_id: if dry_run { "DRY_RUN".into() } else { "scripted-1".into() },
            status: "resting".into(),
            spec: spec.clone(),
        })
    }

    async fn multivariate_collections_page(
        &self,
        _cursor: Option<String>,
        _limit: u32,
    ) -> Result<Page<Event>> {
        Ok(Page::last(Vec::new()))
    }

    async fn lookup_multivariate_ticker(
        &self,
        collection: &EventTicker,
        _selected: &[Ticker],
    ) -> Result<Ticker> {
        Ok(Ticker::from(format!("{collection}-LOOKUP")))
    }
}
