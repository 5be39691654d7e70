//! Alert evaluation against current market state.
//!
//! Pure: the monitor loop supplies markets and sentiment readings, the
//! evaluator decides what fired. Sentiment derivation is external; only the
//! stored value is consumed here.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::core::domain::{Alert, AlertKind, Market, SentimentScore, Ticker};
use crate::core::service::notifier::{Notifier, NotifyEvent};

/// One alert's evaluation.
#[derive(Debug, Clone)]
pub struct AlertEvaluation {
    pub alert: Alert,
    /// The value compared against the threshold, when observable.
    pub observed: Option<Decimal>,
    pub triggered: bool,
}

fn observe(alert: &Alert, market: Option<&Market>, sentiment: Option<&SentimentScore>) -> Option<Decimal> {
    match alert.kind {
        AlertKind::Price => market
            .and_then(Market::midpoint)
            .and_then(|p| Decimal::try_from(p).ok()),
        AlertKind::Volume => market.map(|m| Decimal::from(m.volume_24h)),
        AlertKind::Spread => market
            .and_then(Market::spread_cents)
            .and_then(|s| Decimal::try_from(s).ok()),
        AlertKind::Sentiment => sentiment.and_then(|s| Decimal::try_from(s.score).ok()),
    }
}

/// Evaluate every alert against the supplied state.
#[must_use]
pub fn evaluate(
    alerts: &[Alert],
    markets: &HashMap<Ticker, Market>,
    sentiment: &HashMap<Ticker, SentimentScore>,
) -> Vec<AlertEvaluation> {
    alerts
        .iter()
        .map(|alert| {
            let observed = observe(
                alert,
                markets.get(&alert.ticker),
                sentiment.get(&alert.ticker),
            );
            let triggered = observed.is_some_and(|value| alert.triggers(value));
            AlertEvaluation {
                alert: alert.clone(),
                observed,
                triggered,
            }
        })
        .collect()
}

/// Forward triggered evaluations to the notifier.
pub fn notify_triggered(evaluations: &[AlertEvaluation], notifier: &dyn Notifier) -> usize {
    let mut fired = 0;
    for eval in evaluations.iter().filter(|e| e.triggered) {
        if let Some(observed) = eval.observed {
            notifier.notify(&NotifyEvent::AlertTriggered {
                ticker: eval.alert.ticker.clone(),
                kind: eval.alert.kind,
                observed,
                threshold: eval.alert.threshold,
            });
            fired += 1;
        }
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::Direction;
    use crate::testkit::market;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn state(ticker: &str, bid: i64, ask: i64) -> HashMap<Ticker, Market> {
        let mut m = market(ticker, Some(bid), Some(ask));
        m.volume_24h = 5_000;
        HashMap::from([(Ticker::from(ticker), m)])
    }

    #[test]
    fn price_alert_triggers_on_midpoint() {
        let alerts = vec![Alert::new(
            AlertKind::Price,
            Ticker::from("MKT-1"),
            dec!(0.40),
            Direction::Above,
        )];
        let evals = evaluate(&alerts, &state("MKT-1", 44, 48), &HashMap::new());
        assert!(evals[0].triggered);
        assert_eq!(evals[0].observed.unwrap().round_dp(4), dec!(0.46));
    }

    #[test]
    fn sentiment_alert_reads_stored_score() {
        let alerts = vec![Alert::new(
            AlertKind::Sentiment,
            Ticker::from("MKT-1"),
            dec!(-0.5),
            Direction::Below,
        )];
        let sentiment = HashMap::from([(
            Ticker::from("MKT-1"),
            SentimentScore {
                ticker: Ticker::from("MKT-1"),
                scored_at: Utc::now(),
                score: -0.8,
                source: "external".into(),
            },
        )]);
        let evals = evaluate(&alerts, &HashMap::new(), &sentiment);
        assert!(evals[0].triggered);
    }

    #[test]
    fn unobservable_alerts_do_not_trigger() {
        let alerts = vec![Alert::new(
            AlertKind::Price,
            Ticker::from("GONE"),
            dec!(0.5),
            Direction::Above,
        )];
        let evals = evaluate(&alerts, &HashMap::new(), &HashMap::new());
        assert!(!evals[0].triggered);
        assert!(evals[0].observed.is_none());
    }
}
