//! Tiered token-bucket rate limiting.
//!
//! One process-wide limiter is shared by every client via `Arc`; read and
//! write operations draw from separate buckets sized to the account tier.
//! Bucket capacity is one second of tokens and the effective refill rate
//! carries a 0.9 safety margin against the nominal tier limits.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::core::service::ShutdownSignal;
use crate::error::{Error, Result};

/// Safety margin applied to nominal tier refill rates.
const SAFETY_MARGIN: f64 = 0.9;

/// Waits longer than this are logged.
const WAIT_LOG_THRESHOLD: Duration = Duration::from_millis(100);

/// Account tier, determining nominal read/write tokens per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Basic,
    Advanced,
    Premier,
    Prime,
}

impl Tier {
    /// Nominal read tokens per second.
    #[must_use]
    pub const fn read_per_sec(&self) -> f64 {
        match self {
            Self::Basic => 20.0,
            Self::Advanced => 30.0,
            Self::Premier => 100.0,
            Self::Prime => 400.0,
        }
    }

    /// Nominal write tokens per second.
    #[must_use]
    pub const fn write_per_sec(&self) -> f64 {
        match self {
            Self::Basic => 10.0,
            Self::Advanced => 30.0,
            Self::Premier => 100.0,
            Self::Prime => 400.0,
        }
    }
}

/// Whether an operation draws from the read or write bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Read,
    Write,
}

/// Token cost of one operation. Everything costs one token except bulk
/// cancellation.
#[must_use]
pub fn op_cost(op: &str) -> f64 {
    if op == "batch_cancel_orders" {
        0.2
    } else {
        1.0
    }
}

struct Bucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(nominal_per_sec: f64, now: Instant) -> Self {
        let capacity = nominal_per_sec;
        Self {
            capacity,
            refill_per_sec: nominal_per_sec * SAFETY_MARGIN,
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Take `cost` tokens if available, else return the wait until they are.
    fn try_take(&mut self, cost: f64, now: Instant) -> std::result::Result<(), Duration> {
        self.refill(now);
        if self.tokens >= cost {
            self.tokens -= cost;
            Ok(())
        } else {
            let deficit = cost - self.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }
}

/// Process-wide tiered rate limiter.
pub struct RateLimiter {
    tier: Tier,
    read: Mutex<Bucket>,
    write: Mutex<Bucket>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(tier: Tier) -> Self {
        let now = Instant::now();
        Self {
            tier,
            read: Mutex::new(Bucket::new(tier.read_per_sec(), now)),
            write: Mutex::new(Bucket::new(tier.write_per_sec(), now)),
        }
    }

    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Block until a token is available for `op`, honoring cancellation.
    pub async fn acquire(
        &self,
        class: OpClass,
        op: &'static str,
        shutdown: &ShutdownSignal,
    ) -> Result<()> {
        let cost = op_cost(op);
        let started = Instant::now();
        let mut shutdown = shutdown.clone();

        loop {
            if shutdown.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let attempt = {
                let bucket = match class {
                    OpClass::Read => &self.read,
                    OpClass::Write => &self.write,
                };
                bucket.lock().try_take(cost, Instant::now())
            };

            match attempt {
                Ok(()) => {
                    let waited = started.elapsed();
                    if waited > WAIT_LOG_THRESHOLD {
                        debug!(
                            op,
                            waited_ms = waited.as_millis() as u64,
                            "rate limiter delayed operation"
                        );
                    }
                    return Ok(());
                }
                Err(wait) => {
                    tokio::select! {
                        () = tokio::time::sleep(wait) => {}
                        () = shutdown.cancelled() => return Err(Error::Cancelled),
                    }
                }
            }
        }
    }
}
