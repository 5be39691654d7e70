//! Prediction and thesis resolution.
//!
//! After a settlements sync, any prediction whose market has settled gets
//! its outcome and Brier score filled in, and active theses covering the
//! market resolve with the outcome.

use tracing::info;

use crate::core::domain::PredictionLog;
use crate::core::store::{PredictionStore, SettlementStore, ThesisStore};
use crate::error::Result;

/// Resolve everything resolvable. Returns the number of predictions updated.
pub fn resolve_settled(
    predictions: &PredictionStore,
    theses: &ThesisStore,
    settlements: &SettlementStore,
) -> Result<usize> {
    let mut resolved = 0;

    for (id, ticker, predicted) in predictions.unresolved()? {
        let Some(settlement) = settlements.find(&ticker)? else {
            continue;
        };
        let outcome = settlement.settlement_value;
        let brier = PredictionLog::brier(predicted, outcome);
        predictions.resolve(id, outcome, settlement.settled_at, brier)?;
        theses.resolve_covering(&ticker, outcome)?;
        resolved += 1;
    }

    if resolved > 0 {
        info!(resolved, "resolved settled predictions");
    }
    Ok(resolved)
}
