//! Repositories over the embedded store.
//!
//! Each aggregate gets a repository with `upsert_batch`-style writers and
//! lifecycle queries. Writers chunk into transactions of [`BATCH_SIZE`]
//! rows so a failure mid-stream keeps everything already committed.

mod alerts;
mod markets;
mod portfolio;
mod research;
mod snapshots;

pub use alerts::AlertStore;
pub use markets::MarketStore;
pub use portfolio::{FillStore, OrderStore, SettlementStore};
pub use research::{NewsStore, PredictionStore, SentimentStore, ThesisStore};
pub use snapshots::SnapshotStore;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Rows committed per transaction within a batch write.
pub const BATCH_SIZE: usize = 100;

pub(crate) fn ts_to_string(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn ts_from_string(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("{field}: {e}")))
}

pub(crate) fn opt_ts_from_string(field: &str, raw: Option<&String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| ts_from_string(field, s)).transpose()
}
