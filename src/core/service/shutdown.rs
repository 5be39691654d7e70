//! Cooperative shutdown propagation.
//!
//! A single controller lives in the binary; every long-running component
//! holds a cloned [`ShutdownSignal`] and checks it between suspension points.
//! Cancellation interrupts between requests, never mid-transaction.

use tokio::sync::watch;

/// Sending half. Owned by the entrypoint.
#[derive(Debug)]
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Get a signal handle for a component.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Request cooperative shutdown of all components.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half, cheaply cloneable.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires. For tests and one-shot invocations.
    #[must_use]
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Leak the sender so the channel stays open.
        std::mem::forget(tx);
        Self { rx }
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when shutdown is requested.
    pub async fn cancelled(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        // An Err means the controller dropped, which we treat as shutdown.
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_waiters() {
        let controller = ShutdownController::new();
        let mut signal = controller.signal();
        assert!(!signal.is_cancelled());

        controller.trigger();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_controller_counts_as_shutdown() {
        let controller = ShutdownController::new();
        let mut signal = controller.signal();
        drop(controller);
        signal.cancelled().await;
    }

    #[test]
    fn never_signal_is_not_cancelled() {
        assert!(!ShutdownSignal::never().is_cancelled());
    }
}
