//! Persisted research inputs: news items and externally derived sentiment.

use chrono::{DateTime, Utc};

use super::id::Ticker;

/// A fetched news article, optionally pinned to a market.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub ticker: Option<Ticker>,
    pub url: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// A sentiment reading for a market. Derivation is external; the alert
/// evaluator only consumes the value.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentScore {
    pub ticker: Ticker,
    pub scored_at: DateTime<Utc>,
    /// Signed score, conventionally in `[-1, 1]`.
    pub score: f64,
    pub source: String,
}
