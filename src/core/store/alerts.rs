//! Alert repository.

use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::core::db::model::AlertRow;
use crate::core::db::schema::alerts;
use crate::core::db::DbPool;
use crate::core::domain::{Alert, AlertId, AlertKind, Direction, Ticker};
use crate::error::{Error, Result};

/// SQLite-backed alert store.
pub struct AlertStore {
    pool: DbPool,
}

impl AlertStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(alert: &Alert) -> AlertRow {
        AlertRow {
            id: alert.id.to_string(),
            kind: alert.kind.as_str().to_string(),
            ticker: alert.ticker.to_string(),
            threshold: alert.threshold.to_string(),
            direction: alert.direction.as_str().to_string(),
            active: alert.active,
        }
    }

    fn from_row(row: AlertRow) -> Result<Alert> {
        let kind = AlertKind::parse(&row.kind)
            .ok_or_else(|| Error::Parse(format!("alerts.kind: {:?}", row.kind)))?;
        let direction = Direction::parse(&row.direction)
            .ok_or_else(|| Error::Parse(format!("alerts.direction: {:?}", row.direction)))?;
        let threshold = Decimal::from_str(&row.threshold)
            .map_err(|e| Error::Parse(format!("alerts.threshold: {e}")))?;
        Ok(Alert {
            id: AlertId::from(row.id),
            kind,
            ticker: Ticker::from(row.ticker),
            threshold,
            direction,
            active: row.active,
        })
    }

    pub fn save(&self, alert: &Alert) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        diesel::replace_into(alerts::table)
            .values(&Self::to_row(alert))
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    pub fn list(&self, active_only: bool) -> Result<Vec<Alert>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<AlertRow> = if active_only {
            alerts::table
                .filter(alerts::active.eq(true))
                .load(&mut conn)
                .map_err(|e| Error::Database(e.to_string()))?
        } else {
            alerts::table
                .load(&mut conn)
                .map_err(|e| Error::Database(e.to_string()))?
        };
        rows.into_iter().map(Self::from_row).collect()
    }

    pub fn set_active(&self, id: &AlertId, active: bool) -> Result<bool> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let updated = diesel::update(alerts::table.find(id.to_string()))
            .set(alerts::active.eq(active))
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(updated > 0)
    }

    pub fn delete(&self, id: &AlertId) -> Result<bool> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let deleted = diesel::delete(alerts::table.find(id.to_string()))
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(deleted > 0)
    }
}
