//! Market and event repository.

use chrono::Utc;
use diesel::prelude::*;

use super::{opt_ts_from_string, ts_to_string, BATCH_SIZE};
use crate::core::db::model::{EventRow, MarketRow};
use crate::core::db::schema::{events, markets};
use crate::core::db::DbPool;
use crate::core::domain::{
    Event, EventTicker, Market, MarketStatus, PriceUnits, SeriesTicker, Ticker,
};
use crate::error::{Error, Result};

/// SQLite-backed market store.
pub struct MarketStore {
    pool: DbPool,
}

impl MarketStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn market_to_row(market: &Market) -> MarketRow {
        MarketRow {
            ticker: market.ticker.to_string(),
            event_ticker: market.event_ticker.to_string(),
            series_ticker: market.series_ticker.as_ref().map(ToString::to_string),
            title: market.title.clone(),
            status: market.status.as_str().to_string(),
            created_time: market.created_time.map(ts_to_string),
            open_time: market.open_time.map(ts_to_string),
            close_time: market.close_time.map(ts_to_string),
            settlement_time: market.settlement_time.map(ts_to_string),
            yes_bid: market.yes_bid.map(|p| p.units()),
            yes_ask: market.yes_ask.map(|p| p.units()),
            volume: market.volume,
            volume_24h: market.volume_24h,
            open_interest: market.open_interest,
            liquidity: market.liquidity,
            multivariate: market.is_multivariate,
            updated_at: ts_to_string(Utc::now()),
        }
    }

    fn market_from_row(row: MarketRow) -> Result<Market> {
        let status = MarketStatus::parse(&row.status)
            .ok_or_else(|| Error::Parse(format!("{}: bad stored status {}", row.ticker, row.status)))?;
        Ok(Market {
            ticker: Ticker::from(row.ticker),
            event_ticker: EventTicker::from(row.event_ticker),
            series_ticker: row.series_ticker.map(SeriesTicker::from),
            title: row.title,
            status,
            created_time: opt_ts_from_string("created_time", row.created_time.as_ref())?,
            open_time: opt_ts_from_string("open_time", row.open_time.as_ref())?,
            close_time: opt_ts_from_string("close_time", row.close_time.as_ref())?,
            settlement_time: opt_ts_from_string("settlement_time", row.settlement_time.as_ref())?,
            yes_bid: row.yes_bid.map(PriceUnits::from_units),
            yes_ask: row.yes_ask.map(PriceUnits::from_units),
            volume: row.volume,
            volume_24h: row.volume_24h,
            open_interest: row.open_interest,
            liquidity: row.liquidity,
            is_multivariate: row.multivariate,
        })
    }

    fn event_to_row(event: &Event) -> EventRow {
        EventRow {
            ticker: event.ticker.to_string(),
            series_ticker: event.series_ticker.as_ref().map(ToString::to_string),
            title: event.title.clone(),
            category: event.category.clone(),
            multivariate: event.multivariate,
        }
    }

    /// Upsert events in committed chunks.
    pub fn upsert_events(&self, batch: &[Event]) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;

        let mut written = 0;
        for chunk in batch.chunks(BATCH_SIZE) {
            let rows: Vec<EventRow> = chunk.iter().map(Self::event_to_row).collect();
            written += conn.immediate_transaction::<_, Error, _>(|conn| {
                diesel::replace_into(events::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|e| Error::Database(e.to_string()))
            })?;
        }
        Ok(written)
    }

    /// Upsert markets in committed chunks, creating stub parent events as
    /// needed to satisfy the foreign key.
    pub fn upsert_markets(&self, batch: &[Market]) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;

        let mut written = 0;
        for chunk in batch.chunks(BATCH_SIZE) {
            let stubs: Vec<EventRow> = chunk
                .iter()
                .map(|m| EventRow {
                    ticker: m.event_ticker.to_string(),
                    series_ticker: m.series_ticker.as_ref().map(ToString::to_string),
                    title: String::new(),
                    category: None,
                    multivariate: m.is_multivariate,
                })
                .collect();
            let rows: Vec<MarketRow> = chunk.iter().map(Self::market_to_row).collect();

            written += conn.immediate_transaction::<_, Error, _>(|conn| {
                diesel::insert_or_ignore_into(events::table)
                    .values(&stubs)
                    .execute(conn)
                    .map_err(|e| Error::Database(e.to_string()))?;
                diesel::replace_into(markets::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|e| Error::Database(e.to_string()))
            })?;
        }
        Ok(written)
    }

    pub fn find(&self, ticker: &Ticker) -> Result<Option<Market>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<MarketRow> = markets::table
            .find(ticker.to_string())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(Self::market_from_row).transpose()
    }

    /// List markets, optionally restricted to one status.
    pub fn list(&self, status: Option<MarketStatus>) -> Result<Vec<Market>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<MarketRow> = match status {
            Some(status) => markets::table
                .filter(markets::status.eq(status.as_str()))
                .load(&mut conn)
                .map_err(|e| Error::Database(e.to_string()))?,
            None => markets::table
                .load(&mut conn)
                .map_err(|e| Error::Database(e.to_string()))?,
        };
        rows.into_iter().map(Self::market_from_row).collect()
    }

    /// Tickers of all open markets.
    pub fn open_tickers(&self) -> Result<Vec<Ticker>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let tickers: Vec<String> = markets::table
            .filter(markets::status.eq(MarketStatus::Open.as_str()))
            .select(markets::ticker)
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(tickers.into_iter().map(Ticker::from).collect())
    }

    /// Markets grouped by event, for arbitrage scans.
    pub fn markets_by_event(&self, event: &EventTicker) -> Result<Vec<Market>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<MarketRow> = markets::table
            .filter(markets::event_ticker.eq(event.as_str()))
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Self::market_from_row).collect()
    }

    pub fn count(&self) -> Result<i64> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        markets::table
            .count()
            .get_result(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{market, memory_pool};

    #[test]
    fn market_roundtrip_preserves_fields() {
        let store = MarketStore::new(memory_pool());
        let mut m = market("KXBTC-24DEC31", Some(40), Some(44));
        m.volume_24h = 777;
        m.liquidity = Some(123_456);
        m.close_time = Some(Utc::now());

        store.upsert_markets(std::slice::from_ref(&m)).unwrap();
        let loaded = store.find(&m.ticker).unwrap().unwrap();

        assert_eq!(loaded.yes_bid, m.yes_bid);
        assert_eq!(loaded.yes_ask, m.yes_ask);
        assert_eq!(loaded.volume_24h, 777);
        assert_eq!(loaded.liquidity, Some(123_456));
        assert_eq!(loaded.status, m.status);
        // RFC 3339 storage keeps timestamps to the second or better.
        let dt = (loaded.close_time.unwrap() - m.close_time.unwrap()).num_seconds();
        assert_eq!(dt, 0);
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = MarketStore::new(memory_pool());
        let m = market("MKT-1", Some(40), Some(44));
        store.upsert_markets(std::slice::from_ref(&m)).unwrap();
        store.upsert_markets(std::slice::from_ref(&m)).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn stub_event_satisfies_foreign_key() {
        let store = MarketStore::new(memory_pool());
        // No explicit event upsert; the FK must still hold.
        let m = market("MKT-1", Some(40), Some(44));
        store.upsert_markets(std::slice::from_ref(&m)).unwrap();
        assert!(store.find(&m.ticker).unwrap().is_some());
    }

    #[test]
    fn list_filters_by_status() {
        let store = MarketStore::new(memory_pool());
        let open = market("OPEN-1", Some(40), Some(44));
        let mut settled = market("DONE-1", Some(40), Some(44));
        settled.status = MarketStatus::Settled;
        store.upsert_markets(&[open, settled]).unwrap();

        assert_eq!(store.list(Some(MarketStatus::Open)).unwrap().len(), 1);
        assert_eq!(store.list(None).unwrap().len(), 2);
        assert_eq!(store.open_tickers().unwrap(), vec![Ticker::from("OPEN-1")]);
    }
}
