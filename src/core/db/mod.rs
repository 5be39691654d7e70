//! Database layer: connection pool, embedded migrations, and maintenance.
//!
//! Single-writer discipline: mutating batches run inside explicit
//! transactions, and only the ingestion scheduler and the orchestrator's
//! prediction writer hold write transactions. Readers are concurrent.

pub mod model;
pub mod schema;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::prelude::*;
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::error::{Error, Result};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Database connection pool type alias.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Applied to every pooled connection: WAL durability, enforced foreign
/// keys, and a busy timeout so concurrent readers do not error out.
#[derive(Debug, Clone, Copy)]
struct ConnectionPragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionPragmas {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Create a connection pool for the given database URL.
///
/// # Errors
/// Returns an error if the pool cannot be created.
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(5)
        .connection_customizer(Box::new(ConnectionPragmas))
        .build(manager)
        .map_err(|e| Error::Connection(e.to_string()))
}

/// Apply any pending embedded migrations.
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Database(e.to_string()))?;
    if !applied.is_empty() {
        info!(count = applied.len(), "applied database migrations");
    }
    Ok(())
}

/// Refuse writes when required migrations are unapplied.
pub fn ensure_schema(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    let pending = conn
        .has_pending_migration(MIGRATIONS)
        .map_err(|e| Error::Database(e.to_string()))?;
    if pending {
        return Err(Error::SchemaMismatch(
            "pending migrations; run `edgewatch db migrate` before writing".into(),
        ));
    }
    Ok(())
}

/// Row counts a prune would delete (or did delete).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    pub price_snapshots: usize,
    pub orderbook_snapshots: usize,
    pub news_items: usize,
    pub applied: bool,
}

/// Delete snapshots and news older than `cutoff`. Defaults to dry-run:
/// counts are reported and nothing is removed unless `apply` is set.
pub fn prune(pool: &DbPool, cutoff: chrono::DateTime<chrono::Utc>, apply: bool) -> Result<PruneReport> {
    use schema::{news_items, orderbook_snapshots, price_snapshots};

    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    let cutoff = cutoff.to_rfc3339();

    let report = conn
        .immediate_transaction::<_, Error, _>(|conn| {
            let snapshots: i64 = price_snapshots::table
                .filter(price_snapshots::snapshot_ts.lt(&cutoff))
                .count()
                .get_result(conn)
                .map_err(|e| Error::Database(e.to_string()))?;
            let books: i64 = orderbook_snapshots::table
                .filter(orderbook_snapshots::snapshot_ts.lt(&cutoff))
                .count()
                .get_result(conn)
                .map_err(|e| Error::Database(e.to_string()))?;
            let news: i64 = news_items::table
                .filter(news_items::fetched_at.lt(&cutoff))
                .count()
                .get_result(conn)
                .map_err(|e| Error::Database(e.to_string()))?;

            if apply {
                diesel::delete(
                    price_snapshots::table.filter(price_snapshots::snapshot_ts.lt(&cutoff)),
                )
                .execute(conn)
                .map_err(|e| Error::Database(e.to_string()))?;
                diesel::delete(
                    orderbook_snapshots::table
                        .filter(orderbook_snapshots::snapshot_ts.lt(&cutoff)),
                )
                .execute(conn)
                .map_err(|e| Error::Database(e.to_string()))?;
                diesel::delete(news_items::table.filter(news_items::fetched_at.lt(&cutoff)))
                    .execute(conn)
                    .map_err(|e| Error::Database(e.to_string()))?;
            }

            Ok(PruneReport {
                price_snapshots: snapshots as usize,
                orderbook_snapshots: books as usize,
                news_items: news as usize,
                applied: apply,
            })
        })?;

    info!(
        snapshots = report.price_snapshots,
        books = report.orderbook_snapshots,
        news = report.news_items,
        applied = report.applied,
        "prune"
    );
    Ok(report)
}

/// Compact the store in place.
pub fn reclaim(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    conn.batch_execute("VACUUM;")
        .map_err(|e| Error::Database(e.to_string()))
}

/// Recover-to-new-file: write a compacted copy at `target_path`. The
/// primary file is never deleted to repair corruption.
pub fn recover_to(pool: &DbPool, target_path: &str) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    let escaped = target_path.replace('\'', "''");
    conn.batch_execute(&format!("VACUUM INTO '{escaped}';"))
        .map_err(|e| Error::Database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pool_with_memory_db() {
        let pool = create_pool(":memory:");
        assert!(pool.is_ok());
    }

    #[test]
    fn migrations_then_schema_check_pass() {
        let pool = create_pool(":memory:").unwrap();
        run_migrations(&pool).unwrap();
        ensure_schema(&pool).unwrap();
    }

    #[test]
    fn unmigrated_store_refuses_writes() {
        let pool = create_pool(":memory:").unwrap();
        let err = ensure_schema(&pool).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn prune_defaults_to_dry_run() {
        use super::model::PriceSnapshotRow;
        use super::schema::price_snapshots;

        let pool = create_pool(":memory:").unwrap();
        run_migrations(&pool).unwrap();

        let mut conn = pool.get().unwrap();
        let old = PriceSnapshotRow {
            ticker: "MKT-1".into(),
            snapshot_ts: "2020-01-01T00:00:00+00:00".into(),
            yes_bid: Some(4000),
            yes_ask: Some(4400),
            volume: 0,
            open_interest: 0,
            liquidity: None,
        };
        diesel::insert_into(price_snapshots::table)
            .values(&old)
            .execute(&mut conn)
            .unwrap();
        drop(conn);

        let report = prune(&pool, chrono::Utc::now(), false).unwrap();
        assert_eq!(report.price_snapshots, 1);
        assert!(!report.applied);

        // Still present after the dry run.
        let report = prune(&pool, chrono::Utc::now(), true).unwrap();
        assert_eq!(report.price_snapshots, 1);

        let report = prune(&pool, chrono::Utc::now(), false).unwrap();
        assert_eq!(report.price_snapshots, 0);
    }
}
