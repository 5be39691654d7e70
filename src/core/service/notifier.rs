//! Notification seam.
//!
//! The core only emits events through this single-method trait; transports
//! (webhook, file, chat) live outside the crate. Implementations may be
//! no-ops.

use rust_decimal::Decimal;

use crate::core::domain::{AlertKind, Ticker};

/// Something the user may want to hear about.
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    AlertTriggered {
        ticker: Ticker,
        kind: AlertKind,
        observed: Decimal,
        threshold: Decimal,
    },
    EscalationSuggested {
        ticker: Ticker,
        reason: String,
    },
    IngestDegraded {
        consecutive_failures: u32,
        detail: String,
    },
}

/// Narrow outbound notification contract.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &NotifyEvent);
}

/// Discards everything.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &NotifyEvent) {}
}

/// Logs events through tracing.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, event: &NotifyEvent) {
        match event {
            NotifyEvent::AlertTriggered {
                ticker,
                kind,
                observed,
                threshold,
            } => {
                tracing::info!(
                    ticker = %ticker,
                    kind = kind.as_str(),
                    observed = %observed,
                    threshold = %threshold,
                    "alert triggered"
                );
            }
            NotifyEvent::EscalationSuggested { ticker, reason } => {
                tracing::info!(ticker = %ticker, reason, "escalation suggested");
            }
            NotifyEvent::IngestDegraded {
                consecutive_failures,
                detail,
            } => {
                tracing::warn!(consecutive_failures, detail, "ingestion degraded");
            }
        }
    }
}
