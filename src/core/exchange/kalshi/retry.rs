//! Retry with capped exponential backoff and full jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::core::service::ShutdownSignal;
use crate::error::{Error, Result};

/// Backoff parameters for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): full jitter over the
    /// capped exponential, floored by any server-provided `Retry-After`.
    #[must_use]
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exp = self
            .base
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.cap);
        let jittered = Duration::from_secs_f64(
            rand::thread_rng().gen_range(0.0..=exp.as_secs_f64().max(f64::EPSILON)),
        );
        match retry_after {
            Some(floor) => jittered.max(floor).min(self.cap),
            None => jittered,
        }
    }
}

/// Run `operation` until it succeeds, a terminal error surfaces, retries are
/// exhausted, or shutdown is requested.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    op: &'static str,
    shutdown: &ShutdownSignal,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut shutdown = shutdown.clone();
    let mut attempt = 0u32;

    loop {
        if shutdown.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let retry_after = match &err {
                    Error::RateLimited {
                        retry_after_secs: Some(secs),
                    } => Some(Duration::from_secs(*secs)),
                    _ => None,
                };
                let delay = policy.delay(attempt, retry_after);
                attempt += 1;
                warn!(
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = shutdown.cancelled() => return Err(Error::Cancelled),
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_is_capped_and_jittered() {
        let policy = RetryPolicy::default();
        for attempt in 0..10 {
            let d = policy.delay(attempt, None);
            assert!(d <= policy.cap, "attempt {attempt}: {d:?}");
        }
    }

    #[test]
    fn retry_after_floors_the_delay() {
        let policy = RetryPolicy::default();
        let floor = Duration::from_secs(7);
        for _ in 0..20 {
            assert!(policy.delay(0, Some(floor)) >= floor);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let shutdown = ShutdownSignal::never();

        let result = with_retry(RetryPolicy::default(), "op", &shutdown, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::Transport("reset".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_do_not_retry() {
        let attempts = AtomicU32::new(0);
        let shutdown = ShutdownSignal::never();

        let result: Result<()> = with_retry(RetryPolicy::default(), "op", &shutdown, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Api {
                    status: 404,
                    message: "missing".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let shutdown = ShutdownSignal::never();
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };

        let result: Result<()> = with_retry(policy, "op", &shutdown, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Transport("timeout".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
