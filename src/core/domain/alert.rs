//! Alert configuration consumed by the monitor loop.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{AlertId, Ticker};

/// What quantity an alert watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Midpoint probability.
    Price,
    /// 24h volume.
    Volume,
    /// Quoted spread in cents.
    Spread,
    /// Externally derived sentiment score.
    Sentiment,
}

impl AlertKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "price" => Some(Self::Price),
            "volume" => Some(Self::Volume),
            "spread" => Some(Self::Spread),
            "sentiment" => Some(Self::Sentiment),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Volume => "volume",
            Self::Spread => "spread",
            Self::Sentiment => "sentiment",
        }
    }
}

/// Trigger direction relative to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "above" => Some(Self::Above),
            "below" => Some(Self::Below),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
        }
    }
}

/// A configured alert. Mutated via CLI; evaluated against observed values by
/// the monitor loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: AlertId,
    pub kind: AlertKind,
    pub ticker: Ticker,
    pub threshold: Decimal,
    pub direction: Direction,
    pub active: bool,
}

impl Alert {
    /// Create an active alert.
    pub fn new(kind: AlertKind, ticker: Ticker, threshold: Decimal, direction: Direction) -> Self {
        Self {
            id: AlertId::new(),
            kind,
            ticker,
            threshold,
            direction,
            active: true,
        }
    }

    /// Whether an observed value trips this alert.
    #[must_use]
    pub fn triggers(&self, observed: Decimal) -> bool {
        if !self.active {
            return false;
        }
        match self.direction {
            Direction::Above => observed > self.threshold,
            Direction::Below => observed < self.threshold,
        }
    }
}
