//! Fill domain type: a trade attributed to the authenticated user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{FillId, Ticker};
use super::orderbook::Side;
use super::price::PriceUnits;

/// Whether a fill opened or closed exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillAction {
    Buy,
    Sell,
}

impl FillAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// Alias clarifying that fills use the same YES/NO side as orderbooks.
pub type FillSide = Side;

/// An immutable trade record, uniquely identified by `fill_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub fill_id: FillId,
    pub ticker: Ticker,
    pub side: FillSide,
    pub action: FillAction,
    pub count: i64,
    pub price: PriceUnits,
    pub fees: PriceUnits,
    pub trade_ts: DateTime<Utc>,
}

impl Fill {
    /// Signed cash flow of this fill in price units, fees included.
    ///
    /// Buys are outflows (negative); sells are inflows (positive). Fees are
    /// always an outflow.
    #[must_use]
    pub fn cash_flow(&self) -> i64 {
        let notional = self.count * self.price.units();
        let signed = match self.action {
            FillAction::Buy => -notional,
            FillAction::Sell => notional,
        };
        signed - self.fees.units()
    }
}
