//! Builders for domain primitives.

use chrono::{DateTime, Utc};

use crate::core::db::{DbPool, MIGRATIONS};
use crate::core::domain::{
    EventTicker, Fill, FillAction, FillId, Level, Market, MarketStatus, OrderbookSnapshot,
    PredictionLog, PriceSnapshot, PriceUnits, RunStatus, Side, Ticker,
};

/// An open binary market with the given quotes in cents.
#[must_use]
pub fn market(ticker: &str, bid_cents: Option<i64>, ask_cents: Option<i64>) -> Market {
    Market {
        ticker: Ticker::from(ticker),
        event_ticker: EventTicker::from(format!("{ticker}-EVT")),
        series_ticker: None,
        title: format!("Will {ticker} resolve yes?"),
        status: MarketStatus::Open,
        created_time: Some(Utc::now()),
        open_time: Some(Utc::now()),
        close_time: None,
        settlement_time: None,
        yes_bid: bid_cents.map(PriceUnits::from_cents),
        yes_ask: ask_cents.map(PriceUnits::from_cents),
        volume: 0,
        volume_24h: 0,
        open_interest: 0,
        liquidity: None,
        is_multivariate: false,
    }
}

/// An orderbook from `(price_cents, quantity)` bid lists.
#[must_use]
pub fn book(ticker: &str, yes_bids: &[(i64, i64)], no_bids: &[(i64, i64)]) -> OrderbookSnapshot {
    OrderbookSnapshot::new(
        Ticker::from(ticker),
        yes_bids.iter().map(|&(p, q)| Level::new(p, q)).collect(),
        no_bids.iter().map(|&(p, q)| Level::new(p, q)).collect(),
        Utc::now(),
    )
    .expect("valid test book")
}

/// A price snapshot taken now.
#[must_use]
pub fn snapshot(ticker: &str, bid_cents: i64, ask_cents: i64) -> PriceSnapshot {
    snapshot_at(ticker, bid_cents, ask_cents, Utc::now())
}

/// A price snapshot at a specific time.
#[must_use]
pub fn snapshot_at(
    ticker: &str,
    bid_cents: i64,
    ask_cents: i64,
    ts: DateTime<Utc>,
) -> PriceSnapshot {
    PriceSnapshot {
        ticker: Ticker::from(ticker),
        snapshot_ts: ts,
        yes_bid: Some(PriceUnits::from_cents(bid_cents)),
        yes_ask: Some(PriceUnits::from_cents(ask_cents)),
        volume: 1_000,
        open_interest: 500,
        liquidity: None,
    }
}

/// A YES-side fill.
#[must_use]
pub fn fill_at(
    id: &str,
    ticker: &str,
    action: FillAction,
    count: i64,
    price_cents: i64,
    ts: DateTime<Utc>,
) -> Fill {
    Fill {
        fill_id: FillId::from(id),
        ticker: Ticker::from(ticker),
        side: Side::Yes,
        action,
        count,
        price: PriceUnits::from_cents(price_cents),
        fees: PriceUnits::ZERO,
        trade_ts: ts,
    }
}

/// A successful, unresolved prediction row.
#[must_use]
pub fn prediction(ticker: &str, predicted: f64) -> PredictionLog {
    PredictionLog {
        ticker: Ticker::from(ticker),
        predicted_prob: predicted,
        market_prob_at_time: Some(0.5),
        confidence: crate::core::domain::Confidence::Medium,
        reasoning: "test prediction".into(),
        factors_json: "[]".into(),
        status: RunStatus::Ok,
        diagnostic: None,
        predicted_at: Utc::now(),
        actual_outcome: None,
        resolved_at: None,
        brier_score: None,
    }
}

/// A migrated in-memory database.
///
/// The pool is capped at one connection so every store sees the same
/// `:memory:` database.
#[must_use]
pub fn memory_pool() -> DbPool {
    use diesel::r2d2::{ConnectionManager, Pool};
    use diesel_migrations::MigrationHarness;

    let manager = ConnectionManager::<diesel::SqliteConnection>::new(":memory:");
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("build test pool");
    let mut conn = pool.get().expect("get test connection");
    diesel::connection::SimpleConnection::batch_execute(
        &mut *conn,
        "PRAGMA foreign_keys = ON;",
    )
    .expect("enable foreign keys");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("run migrations");
    drop(conn);
    pool
}
