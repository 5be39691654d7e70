//! Price and orderbook snapshot repository.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::{ts_from_string, ts_to_string, BATCH_SIZE};
use crate::core::db::model::{OrderbookSnapshotRow, PriceSnapshotRow};
use crate::core::db::schema::{orderbook_snapshots, price_snapshots};
use crate::core::db::DbPool;
use crate::core::domain::{Level, OrderbookSnapshot, PriceSnapshot, PriceUnits, Side, Ticker};
use crate::error::{Error, Result};

/// SQLite-backed snapshot store.
pub struct SnapshotStore {
    pool: DbPool,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct BookJson {
    yes: Vec<(i64, i64)>,
    no: Vec<(i64, i64)>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(snapshot: &PriceSnapshot) -> PriceSnapshotRow {
        PriceSnapshotRow {
            ticker: snapshot.ticker.to_string(),
            snapshot_ts: ts_to_string(snapshot.snapshot_ts),
            yes_bid: snapshot.yes_bid.map(|p| p.units()),
            yes_ask: snapshot.yes_ask.map(|p| p.units()),
            volume: snapshot.volume,
            open_interest: snapshot.open_interest,
            liquidity: snapshot.liquidity,
        }
    }

    fn from_row(row: PriceSnapshotRow) -> Result<PriceSnapshot> {
        Ok(PriceSnapshot {
            ticker: Ticker::from(row.ticker),
            snapshot_ts: ts_from_string("snapshot_ts", &row.snapshot_ts)?,
            yes_bid: row.yes_bid.map(PriceUnits::from_units),
            yes_ask: row.yes_ask.map(PriceUnits::from_units),
            volume: row.volume,
            open_interest: row.open_interest,
            liquidity: row.liquidity,
        })
    }

    /// Append snapshots in committed chunks. Replaying the same batch is a
    /// no-op thanks to the `(ticker, snapshot_ts)` key.
    pub fn upsert_batch(&self, batch: &[PriceSnapshot]) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;

        let mut written = 0;
        for chunk in batch.chunks(BATCH_SIZE) {
            let rows: Vec<PriceSnapshotRow> = chunk.iter().map(Self::to_row).collect();
            written += conn.immediate_transaction::<_, Error, _>(|conn| {
                diesel::replace_into(price_snapshots::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|e| Error::Database(e.to_string()))
            })?;
        }
        Ok(written)
    }

    /// Most recent snapshot for a ticker.
    pub fn latest(&self, ticker: &Ticker) -> Result<Option<PriceSnapshot>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<PriceSnapshotRow> = price_snapshots::table
            .filter(price_snapshots::ticker.eq(ticker.as_str()))
            .order(price_snapshots::snapshot_ts.desc())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(Self::from_row).transpose()
    }

    /// Latest snapshot at or before `cutoff` (the movers baseline).
    pub fn latest_at_or_before(
        &self,
        ticker: &Ticker,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<PriceSnapshot>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<PriceSnapshotRow> = price_snapshots::table
            .filter(price_snapshots::ticker.eq(ticker.as_str()))
            .filter(price_snapshots::snapshot_ts.le(ts_to_string(cutoff)))
            .order(price_snapshots::snapshot_ts.desc())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(Self::from_row).transpose()
    }

    /// Snapshots in `[from, to]`, ascending. Readers observe insertion order
    /// on equal timestamps.
    pub fn snapshots_in_range(
        &self,
        ticker: &Ticker,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceSnapshot>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<PriceSnapshotRow> = price_snapshots::table
            .filter(price_snapshots::ticker.eq(ticker.as_str()))
            .filter(price_snapshots::snapshot_ts.ge(ts_to_string(from)))
            .filter(price_snapshots::snapshot_ts.le(ts_to_string(to)))
            .order(price_snapshots::snapshot_ts.asc())
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Self::from_row).collect()
    }

    pub fn count(&self) -> Result<i64> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        price_snapshots::table
            .count()
            .get_result(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Persist a full orderbook snapshot as JSON.
    pub fn store_orderbook(&self, book: &OrderbookSnapshot) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let payload = BookJson {
            yes: book
                .bids(Side::Yes)
                .iter()
                .map(|l| (l.price_cents, l.quantity))
                .collect(),
            no: book
                .bids(Side::No)
                .iter()
                .map(|l| (l.price_cents, l.quantity))
                .collect(),
        };
        let row = OrderbookSnapshotRow {
            ticker: book.ticker().to_string(),
            snapshot_ts: ts_to_string(book.fetched_at()),
            book_json: serde_json::to_string(&payload)?,
        };
        diesel::replace_into(orderbook_snapshots::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Most recent stored orderbook for a ticker.
    pub fn latest_orderbook(&self, ticker: &Ticker) -> Result<Option<OrderbookSnapshot>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<OrderbookSnapshotRow> = orderbook_snapshots::table
            .filter(orderbook_snapshots::ticker.eq(ticker.as_str()))
            .order(orderbook_snapshots::snapshot_ts.desc())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        row.map(|row| {
            let payload: BookJson = serde_json::from_str(&row.book_json)?;
            let to_levels =
                |side: Vec<(i64, i64)>| side.into_iter().map(|(p, q)| Level::new(p, q)).collect();
            OrderbookSnapshot::new(
                Ticker::from(row.ticker),
                to_levels(payload.yes),
                to_levels(payload.no),
                ts_from_string("snapshot_ts", &row.snapshot_ts)?,
            )
        })
        .transpose()
    }
}
