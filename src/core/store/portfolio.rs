//! Fill, settlement, and order repositories.

use diesel::prelude::*;

use super::{opt_ts_from_string, ts_from_string, ts_to_string, BATCH_SIZE};
use crate::core::db::model::{FillRow, OrderRow, SettlementRow};
use crate::core::db::schema::{fills, orders, settlements};
use crate::core::db::DbPool;
use crate::core::domain::{Fill, FillAction, FillId, PriceUnits, Settlement, Side, Ticker};
use crate::core::exchange::OrderRecord;
use crate::error::{Error, Result};

fn side_from_str(field: &str, s: &str) -> Result<Side> {
    match s {
        "yes" => Ok(Side::Yes),
        "no" => Ok(Side::No),
        other => Err(Error::Parse(format!("{field}: bad side {other:?}"))),
    }
}

fn action_from_str(field: &str, s: &str) -> Result<FillAction> {
    FillAction::parse(s).ok_or_else(|| Error::Parse(format!("{field}: bad action {s:?}")))
}

/// SQLite-backed fill store.
pub struct FillStore {
    pool: DbPool,
}

impl FillStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(fill: &Fill) -> FillRow {
        FillRow {
            fill_id: fill.fill_id.to_string(),
            ticker: fill.ticker.to_string(),
            side: fill.side.as_str().to_string(),
            action: fill.action.as_str().to_string(),
            count: fill.count,
            price: fill.price.units(),
            fees: fill.fees.units(),
            trade_ts: ts_to_string(fill.trade_ts),
        }
    }

    fn from_row(row: FillRow) -> Result<Fill> {
        Ok(Fill {
            side: side_from_str("fills.side", &row.side)?,
            action: action_from_str("fills.action", &row.action)?,
            trade_ts: ts_from_string("fills.trade_ts", &row.trade_ts)?,
            fill_id: FillId::from(row.fill_id),
            ticker: Ticker::from(row.ticker),
            count: row.count,
            price: PriceUnits::from_units(row.price),
            fees: PriceUnits::from_units(row.fees),
        })
    }

    /// Upsert fills keyed by `fill_id`; duplicates replace in place.
    pub fn upsert_batch(&self, batch: &[Fill]) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let mut written = 0;
        for chunk in batch.chunks(BATCH_SIZE) {
            let rows: Vec<FillRow> = chunk.iter().map(Self::to_row).collect();
            written += conn.immediate_transaction::<_, Error, _>(|conn| {
                diesel::replace_into(fills::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|e| Error::Database(e.to_string()))
            })?;
        }
        Ok(written)
    }

    /// All fills in `(trade_ts, fill_id)` order, ready for reconciliation.
    pub fn all_ordered(&self) -> Result<Vec<Fill>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<FillRow> = fills::table
            .order((fills::trade_ts.asc(), fills::fill_id.asc()))
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Self::from_row).collect()
    }

    pub fn for_ticker(&self, ticker: &Ticker) -> Result<Vec<Fill>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<FillRow> = fills::table
            .filter(fills::ticker.eq(ticker.as_str()))
            .order((fills::trade_ts.asc(), fills::fill_id.asc()))
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Self::from_row).collect()
    }

    pub fn count(&self) -> Result<i64> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        fills::table
            .count()
            .get_result(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// SQLite-backed settlement store.
pub struct SettlementStore {
    pool: DbPool,
}

impl SettlementStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(settlement: &Settlement) -> SettlementRow {
        SettlementRow {
            ticker: settlement.ticker.to_string(),
            settled_at: ts_to_string(settlement.settled_at),
            settlement_value: settlement.settlement_value,
            determined_at: settlement.determined_at.map(ts_to_string),
        }
    }

    fn from_row(row: SettlementRow) -> Result<Settlement> {
        Ok(Settlement {
            settled_at: ts_from_string("settlements.settled_at", &row.settled_at)?,
            determined_at: opt_ts_from_string("settlements.determined_at", row.determined_at.as_ref())?,
            ticker: Ticker::from(row.ticker),
            settlement_value: row.settlement_value,
        })
    }

    pub fn upsert_batch(&self, batch: &[Settlement]) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let mut written = 0;
        for chunk in batch.chunks(BATCH_SIZE) {
            let rows: Vec<SettlementRow> = chunk.iter().map(Self::to_row).collect();
            written += conn.immediate_transaction::<_, Error, _>(|conn| {
                diesel::replace_into(settlements::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|e| Error::Database(e.to_string()))
            })?;
        }
        Ok(written)
    }

    pub fn find(&self, ticker: &Ticker) -> Result<Option<Settlement>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<SettlementRow> = settlements::table
            .find(ticker.to_string())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(Self::from_row).transpose()
    }

    pub fn all(&self) -> Result<Vec<Settlement>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<SettlementRow> = settlements::table
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Self::from_row).collect()
    }
}

/// SQLite-backed order store.
pub struct OrderStore {
    pool: DbPool,
}

impl OrderStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(order: &OrderRecord) -> OrderRow {
        OrderRow {
            order_id: order.order_id.to_string(),
            ticker: order.ticker.to_string(),
            side: order.side.as_str().to_string(),
            action: order.action.as_str().to_string(),
            status: order.status.clone(),
            yes_price: order.yes_price_cents,
            count: order.count,
            remaining_count: order.remaining_count,
            created_time: order.created_time.map(ts_to_string),
        }
    }

    fn from_row(row: OrderRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            side: side_from_str("orders.side", &row.side)?,
            action: action_from_str("orders.action", &row.action)?,
            created_time: opt_ts_from_string("orders.created_time", row.created_time.as_ref())?,
            order_id: crate::core::domain::OrderId::from(row.order_id),
            ticker: Ticker::from(row.ticker),
            status: row.status,
            yes_price_cents: row.yes_price,
            count: row.count,
            remaining_count: row.remaining_count,
        })
    }

    pub fn upsert_batch(&self, batch: &[OrderRecord]) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let mut written = 0;
        for chunk in batch.chunks(BATCH_SIZE) {
            let rows: Vec<OrderRow> = chunk.iter().map(Self::to_row).collect();
            written += conn.immediate_transaction::<_, Error, _>(|conn| {
                diesel::replace_into(orders::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|e| Error::Database(e.to_string()))
            })?;
        }
        Ok(written)
    }

    pub fn list(&self) -> Result<Vec<OrderRecord>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<OrderRow> = orders::table
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Self::from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{fill_at, memory_pool};
    use chrono::{Duration, Utc};

    #[test]
    fn fill_roundtrip_and_ordering() {
        let store = FillStore::new(memory_pool());
        let now = Utc::now();
        let fills = vec![
            fill_at("f2", "MKT-1", FillAction::Sell, 50, 60, now + Duration::seconds(5)),
            fill_at("f1", "MKT-1", FillAction::Buy, 100, 45, now),
        ];
        store.upsert_batch(&fills).unwrap();

        let ordered = store.all_ordered().unwrap();
        assert_eq!(ordered[0].fill_id.as_str(), "f1");
        assert_eq!(ordered[1].fill_id.as_str(), "f2");
        assert_eq!(ordered[0].price, PriceUnits::from_cents(45));
    }

    #[test]
    fn duplicate_fill_ids_do_not_duplicate_rows() {
        let store = FillStore::new(memory_pool());
        let f = fill_at("f1", "MKT-1", FillAction::Buy, 100, 45, Utc::now());
        store.upsert_batch(std::slice::from_ref(&f)).unwrap();
        store.upsert_batch(std::slice::from_ref(&f)).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn settlement_roundtrip() {
        let store = SettlementStore::new(memory_pool());
        let s = Settlement {
            ticker: Ticker::from("MKT-1"),
            settled_at: Utc::now(),
            settlement_value: 1,
            determined_at: Some(Utc::now()),
        };
        store.upsert_batch(std::slice::from_ref(&s)).unwrap();
        let loaded = store.find(&s.ticker).unwrap().unwrap();
        assert_eq!(loaded.settlement_value, 1);
        assert!(loaded.determined_at.is_some());
    }
}
