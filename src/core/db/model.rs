//! Diesel row structs. Conversions to and from domain types live in the
//! repository modules.

use diesel::prelude::*;

use super::schema::{
    alerts, events, fills, markets, news_items, orderbook_snapshots, orders, prediction_log,
    price_snapshots, sentiment_scores, settlements, theses,
};

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = events)]
pub struct EventRow {
    pub ticker: String,
    pub series_ticker: Option<String>,
    pub title: String,
    pub category: Option<String>,
    pub multivariate: bool,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = markets)]
pub struct MarketRow {
    pub ticker: String,
    pub event_ticker: String,
    pub series_ticker: Option<String>,
    pub title: String,
    pub status: String,
    pub created_time: Option<String>,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub settlement_time: Option<String>,
    pub yes_bid: Option<i64>,
    pub yes_ask: Option<i64>,
    pub volume: i64,
    pub volume_24h: i64,
    pub open_interest: i64,
    pub liquidity: Option<i64>,
    pub multivariate: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = price_snapshots)]
pub struct PriceSnapshotRow {
    pub ticker: String,
    pub snapshot_ts: String,
    pub yes_bid: Option<i64>,
    pub yes_ask: Option<i64>,
    pub volume: i64,
    pub open_interest: i64,
    pub liquidity: Option<i64>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = orderbook_snapshots)]
pub struct OrderbookSnapshotRow {
    pub ticker: String,
    pub snapshot_ts: String,
    pub book_json: String,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = settlements)]
pub struct SettlementRow {
    pub ticker: String,
    pub settled_at: String,
    pub settlement_value: i32,
    pub determined_at: Option<String>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = fills)]
pub struct FillRow {
    pub fill_id: String,
    pub ticker: String,
    pub side: String,
    pub action: String,
    pub count: i64,
    pub price: i64,
    pub fees: i64,
    pub trade_ts: String,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = orders)]
pub struct OrderRow {
    pub order_id: String,
    pub ticker: String,
    pub side: String,
    pub action: String,
    pub status: String,
    pub yes_price: i64,
    pub count: i64,
    pub remaining_count: i64,
    pub created_time: Option<String>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = theses)]
pub struct ThesisRow {
    pub id: String,
    pub title: String,
    pub markets: String,
    pub your_probability: f64,
    pub market_probability: f64,
    pub confidence: f64,
    pub status: String,
    pub resolution_outcome: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = alerts)]
pub struct AlertRow {
    pub id: String,
    pub kind: String,
    pub ticker: String,
    pub threshold: String,
    pub direction: String,
    pub active: bool,
}

#[derive(Debug, Clone, Queryable)]
pub struct PredictionRow {
    pub id: i32,
    pub ticker: String,
    pub predicted_prob: f64,
    pub market_prob_at_time: Option<f64>,
    pub confidence: String,
    pub reasoning: String,
    pub factors_json: String,
    pub status: String,
    pub diagnostic: Option<String>,
    pub predicted_at: String,
    pub actual_outcome: Option<i32>,
    pub resolved_at: Option<String>,
    pub brier_score: Option<f64>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = prediction_log)]
pub struct NewPredictionRow {
    pub ticker: String,
    pub predicted_prob: f64,
    pub market_prob_at_time: Option<f64>,
    pub confidence: String,
    pub reasoning: String,
    pub factors_json: String,
    pub status: String,
    pub diagnostic: Option<String>,
    pub predicted_at: String,
}

#[derive(Debug, Clone, Queryable)]
pub struct NewsRow {
    pub id: i32,
    pub ticker: Option<String>,
    pub url: String,
    pub title: String,
    pub published_at: Option<String>,
    pub fetched_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = news_items)]
pub struct NewNewsRow {
    pub ticker: Option<String>,
    pub url: String,
    pub title: String,
    pub published_at: Option<String>,
    pub fetched_at: String,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = sentiment_scores)]
pub struct SentimentRow {
    pub ticker: String,
    pub scored_at: String,
    pub score: f64,
    pub source: String,
}
