//! Portfolio reconciliation: fills to FIFO lots to positions and P&L.
//!
//! Positions are never stored; they are recomputed from the ordered fill
//! stream on demand, which makes reconciliation idempotent by `fill_id`.

mod lots;

pub use lots::{Lot, LotQueue};

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::core::domain::{Fill, FillAction, FillId, PriceUnits, Settlement, Side, Ticker};

/// One open position, derived per `(ticker, side)`.
#[derive(Debug, Clone)]
pub struct Position {
    pub ticker: Ticker,
    pub side: Side,
    pub open_lots: Vec<Lot>,
    pub realized_pnl_units: i64,
    pub fees_paid_units: i64,
}

impl Position {
    #[must_use]
    pub fn open_quantity(&self) -> i64 {
        self.open_lots.iter().map(|l| l.quantity).sum()
    }

    #[must_use]
    pub fn cost_basis_units(&self) -> i64 {
        self.open_lots
            .iter()
            .map(|l| l.quantity * l.unit_cost.units())
            .sum()
    }

    /// Volume-weighted average cost of the open lots.
    #[must_use]
    pub fn avg_cost(&self) -> Option<PriceUnits> {
        let quantity = self.open_quantity();
        (quantity > 0).then(|| PriceUnits::from_units(self.cost_basis_units() / quantity))
    }

    /// Unrealized P&L at the given YES mark. The NO side marks at the
    /// complement.
    #[must_use]
    pub fn unrealized_units(&self, yes_mark: PriceUnits) -> i64 {
        let mark = match self.side {
            Side::Yes => yes_mark,
            Side::No => yes_mark.complement(),
        };
        self.open_lots
            .iter()
            .map(|l| l.quantity * (mark.units() - l.unit_cost.units()))
            .sum()
    }
}

#[derive(Debug, Default)]
struct SideBook {
    lots: LotQueue,
    realized_units: i64,
    fees_units: i64,
    cash_flow_units: i64,
}

/// Derived portfolio state for one account.
#[derive(Debug, Default)]
pub struct Portfolio {
    books: HashMap<(Ticker, Side), SideBook>,
    seen: HashSet<FillId>,
}

impl Portfolio {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile an unordered fill set: fills are processed in `trade_ts`
    /// order, stable on ties by `fill_id`, deduplicated by `fill_id`.
    #[must_use]
    pub fn from_fills(fills: impl IntoIterator<Item = Fill>) -> Self {
        let mut sorted: Vec<Fill> = fills.into_iter().collect();
        sorted.sort_by(|a, b| {
            a.trade_ts
                .cmp(&b.trade_ts)
                .then_with(|| a.fill_id.cmp(&b.fill_id))
        });

        let mut portfolio = Self::new();
        for fill in sorted {
            portfolio.apply_fill(&fill);
        }
        portfolio
    }

    /// Apply one fill. Duplicate `fill_id`s are ignored.
    pub fn apply_fill(&mut self, fill: &Fill) {
        if !self.seen.insert(fill.fill_id.clone()) {
            return;
        }

        let book = self
            .books
            .entry((fill.ticker.clone(), fill.side))
            .or_default();
        book.cash_flow_units += fill.cash_flow();
        book.fees_units += fill.fees.units();

        match fill.action {
            FillAction::Buy => {
                book.lots.push_back(Lot {
                    quantity: fill.count,
                    unit_cost: fill.price,
                    acquired_ts: fill.trade_ts,
                });
            }
            FillAction::Sell => {
                let mut remaining = fill.count;
                while remaining > 0 {
                    let Some(front) = book.lots.front_mut() else {
                        warn!(
                            fill_id = %fill.fill_id,
                            ticker = %fill.ticker,
                            excess = remaining,
                            "sell exceeds open lots; ignoring excess"
                        );
                        break;
                    };
                    let consumed = remaining.min(front.quantity);
                    book.realized_units +=
                        consumed * (fill.price.units() - front.unit_cost.units());
                    front.quantity -= consumed;
                    remaining -= consumed;
                    if front.quantity == 0 {
                        book.lots.pop_front();
                    }
                }
            }
        }
    }

    /// Apply a settlement: every remaining lot on both sides realizes at the
    /// side's payout and is cleared.
    pub fn apply_settlement(&mut self, settlement: &Settlement) {
        for side in [Side::Yes, Side::No] {
            let key = (settlement.ticker.clone(), side);
            if let Some(book) = self.books.get_mut(&key) {
                let payout = settlement.payout(side);
                for lot in book.lots.iter() {
                    book.realized_units += lot.quantity * (payout.units() - lot.unit_cost.units());
                }
                book.lots.clear();
            }
        }
    }

    /// Open positions. Tickers with no open lots are omitted.
    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .books
            .iter()
            .filter(|(_, book)| !book.lots.is_empty())
            .map(|((ticker, side), book)| Position {
                ticker: ticker.clone(),
                side: *side,
                open_lots: book.lots.iter().copied().collect(),
                realized_pnl_units: book.realized_units,
                fees_paid_units: book.fees_units,
            })
            .collect();
        positions.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.side.as_str().cmp(b.side.as_str())));
        positions
    }

    /// Realized P&L across all books, open or flat.
    #[must_use]
    pub fn realized_units(&self) -> i64 {
        self.books.values().map(|b| b.realized_units).sum()
    }

    #[must_use]
    pub fn fees_units(&self) -> i64 {
        self.books.values().map(|b| b.fees_units).sum()
    }

    /// Net cash across all fills (fees included, buys negative).
    #[must_use]
    pub fn cash_flow_units(&self) -> i64 {
        self.books.values().map(|b| b.cash_flow_units).sum()
    }

    /// Unrealized P&L across open positions given YES marks per ticker.
    /// Positions without a mark are skipped.
    #[must_use]
    pub fn unrealized_units(&self, yes_marks: &HashMap<Ticker, PriceUnits>) -> i64 {
        self.positions()
            .iter()
            .filter_map(|p| yes_marks.get(&p.ticker).map(|mark| p.unrealized_units(*mark)))
            .sum()
    }

    /// Mark value of all open lots at the given YES marks.
    #[must_use]
    pub fn mark_value_units(&self, yes_marks: &HashMap<Ticker, PriceUnits>) -> i64 {
        self.positions()
            .iter()
            .filter_map(|p| {
                yes_marks.get(&p.ticker).map(|mark| {
                    let side_mark = match p.side {
                        Side::Yes => *mark,
                        Side::No => mark.complement(),
                    };
                    p.open_quantity() * side_mark.units()
                })
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn fill(id: &str, action: FillAction, count: i64, price_cents: i64, offset_secs: i64) -> Fill {
        Fill {
            fill_id: FillId::from(id),
            ticker: Ticker::from("MKT-1"),
            side: Side::Yes,
            action,
            count,
            price: PriceUnits::from_cents(price_cents),
            fees: PriceUnits::ZERO,
            trade_ts: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn fifo_realized_pnl_scenario() {
        // Buy 100@45, buy 50@50, sell 120@60:
        // realized = 100*(60-45) + 20*(60-50) = 1700 cents; 30@50 remain.
        let portfolio = Portfolio::from_fills(vec![
            fill("f1", FillAction::Buy, 100, 45, 0),
            fill("f2", FillAction::Buy, 50, 50, 1),
            fill("f3", FillAction::Sell, 120, 60, 2),
        ]);

        assert_eq!(portfolio.realized_units(), 1700 * 100);
        let positions = portfolio.positions();
        assert_eq!(positions.len(), 1);
        let position = &positions[0];
        assert_eq!(position.open_quantity(), 30);
        assert_eq!(
            position.open_lots[0].unit_cost,
            PriceUnits::from_cents(50)
        );
    }

    #[test]
    fn reprocessing_same_fills_is_idempotent() {
        let fills = vec![
            fill("f1", FillAction::Buy, 100, 45, 0),
            fill("f2", FillAction::Sell, 40, 55, 1),
        ];
        let mut portfolio = Portfolio::from_fills(fills.clone());
        let once = (portfolio.realized_units(), portfolio.positions().len());

        for f in &fills {
            portfolio.apply_fill(f);
        }
        assert_eq!(
            (portfolio.realized_units(), portfolio.positions().len()),
            once
        );
    }

    #[test]
    fn fills_process_in_trade_ts_order_regardless_of_input_order() {
        // Sell arrives first in the vector but trades last.
        let portfolio = Portfolio::from_fills(vec![
            fill("f2", FillAction::Sell, 100, 60, 10),
            fill("f1", FillAction::Buy, 100, 45, 0),
        ]);
        assert_eq!(portfolio.realized_units(), 100 * 1500);
        assert!(portfolio.positions().is_empty());
    }

    #[test]
    fn tie_on_trade_ts_breaks_by_fill_id() {
        let ts = Utc::now();
        let mut buy = fill("a-buy", FillAction::Buy, 10, 45, 0);
        let mut sell = fill("b-sell", FillAction::Sell, 10, 50, 0);
        buy.trade_ts = ts;
        sell.trade_ts = ts;
        let portfolio = Portfolio::from_fills(vec![sell, buy]);
        assert_eq!(portfolio.realized_units(), 10 * 500);
    }

    #[test]
    fn settlement_realizes_remaining_lots_and_clears() {
        let mut portfolio = Portfolio::from_fills(vec![fill("f1", FillAction::Buy, 100, 45, 0)]);

        portfolio.apply_settlement(&Settlement {
            ticker: Ticker::from("MKT-1"),
            settled_at: Utc::now(),
            settlement_value: 1,
            determined_at: None,
        });

        // YES settled at $1: realized = 100 * (100 - 45) cents.
        assert_eq!(portfolio.realized_units(), 100 * 5500);
        assert!(portfolio.positions().is_empty());
    }

    #[test]
    fn no_side_settlement_pays_complement() {
        let no_fill = Fill {
            side: Side::No,
            ..fill("f1", FillAction::Buy, 100, 30, 0)
        };
        let mut portfolio = Portfolio::from_fills(vec![no_fill]);

        portfolio.apply_settlement(&Settlement {
            ticker: Ticker::from("MKT-1"),
            settled_at: Utc::now(),
            settlement_value: 1,
            determined_at: None,
        });

        // Market settled YES, so NO lots expire worthless: 100 * (0 - 30).
        assert_eq!(portfolio.realized_units(), -100 * 3000);
    }

    #[test]
    fn unrealized_marks_no_side_at_complement() {
        let no_fill = Fill {
            side: Side::No,
            ..fill("f1", FillAction::Buy, 50, 40, 0)
        };
        let portfolio = Portfolio::from_fills(vec![no_fill]);

        let marks = HashMap::from([(Ticker::from("MKT-1"), PriceUnits::from_cents(55))]);
        // NO mark = 45c; unrealized = 50 * (45 - 40) cents.
        assert_eq!(portfolio.unrealized_units(&marks), 50 * 500);
    }

    #[test]
    fn equity_identity_holds_with_fees() {
        // realized + unrealized == net_cash_from_fills + fees + unrealized...
        // concretely: realized + unrealized - fees == cash_flow + mark_value.
        let mut f1 = fill("f1", FillAction::Buy, 100, 45, 0);
        f1.fees = PriceUnits::from_cents(10);
        let mut f2 = fill("f2", FillAction::Sell, 60, 52, 1);
        f2.fees = PriceUnits::from_cents(6);
        let portfolio = Portfolio::from_fills(vec![f1, f2]);

        let marks = HashMap::from([(Ticker::from("MKT-1"), PriceUnits::from_cents(50))]);
        let lhs =
            portfolio.realized_units() + portfolio.unrealized_units(&marks) - portfolio.fees_units();
        let rhs = portfolio.cash_flow_units() + portfolio.mark_value_units(&marks);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn oversell_ignores_excess_without_panic() {
        let portfolio = Portfolio::from_fills(vec![
            fill("f1", FillAction::Buy, 50, 45, 0),
            fill("f2", FillAction::Sell, 80, 60, 1),
        ]);
        assert_eq!(portfolio.realized_units(), 50 * 1500);
        assert!(portfolio.positions().is_empty());
    }
}
