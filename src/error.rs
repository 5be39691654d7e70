//! Crate-wide error taxonomy.
//!
//! Transport and rate-limit failures are retried locally by the HTTP client;
//! everything else bubbles up with typed context. The binary maps errors to
//! exit codes: user errors exit 1, system errors exit 2.

use thiserror::Error;

/// Configuration errors with field-level context.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field or variable: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("failed to read configuration file: {0}")]
    ReadFile(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ParseToml(#[from] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    /// Network-level failure: timeout, connection reset, DNS. Retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 429. Retryable, honoring the server-provided floor.
    #[error("rate limited by server{}", retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// HTTP 401/403. Terminal.
    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Non-retryable HTTP status other than auth, with the decoded server message.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Wire payload violated the schema or a domain invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Required migrations are unapplied; writes are refused.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Resource absent; callers may recover.
    #[error("not found: {0}")]
    NotFound(String),

    /// The orchestrator refused to start a step that would exceed budget.
    #[error("budget exceeded: step '{step}' estimated ${estimate} with ${remaining} remaining")]
    BudgetExceeded {
        step: &'static str,
        estimate: rust_decimal::Decimal,
        remaining: rust_decimal::Decimal,
    },

    /// Synthesizer output failed schema validation after one retry.
    #[error("synthesizer produced invalid output: {0}")]
    SynthesizerInvalidOutput(String),

    /// Cooperative shutdown observed.
    #[error("cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            Self::Transport(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}

impl Error {
    /// Whether the HTTP client should retry this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Process exit code: 0 is success, 1 a user error, 2 a system error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::NotFound(_) | Self::Validation(_) => 1,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_is_retryable() {
        assert!(Error::Transport("reset".into()).is_retryable());
        assert!(Error::RateLimited {
            retry_after_secs: Some(3)
        }
        .is_retryable());
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        let server = Error::Api {
            status: 503,
            message: "unavailable".into(),
        };
        let client = Error::Api {
            status: 404,
            message: "no such market".into(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn auth_is_terminal() {
        let err = Error::Auth {
            status: 401,
            message: "bad signature".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn user_errors_exit_one() {
        assert_eq!(Error::NotFound("KXBTC-24".into()).exit_code(), 1);
        assert_eq!(
            Error::Config(ConfigError::MissingField { field: "KEY_ID" }).exit_code(),
            1
        );
    }
}
