//! Kalshi trade API bindings: signing, retry, wire models, and the client.

pub mod auth;
pub mod client;
pub mod retry;
pub mod wire;

pub use auth::RequestSigner;
pub use client::KalshiClient;
pub use retry::{with_retry, RetryPolicy};
