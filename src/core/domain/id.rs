//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id! {
    /// Market ticker, e.g. `KXBTCD-25AUG0112-T64499.99`.
    Ticker
}

string_id! {
    /// Event ticker grouping related markets.
    EventTicker
}

string_id! {
    /// Series ticker grouping related events.
    SeriesTicker
}

string_id! {
    /// Exchange-assigned fill identifier. Globally unique.
    FillId
}

string_id! {
    /// Exchange-assigned order identifier.
    OrderId
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a user-authored thesis. Always a UUID string,
    /// never numeric.
    ThesisId
}

uuid_id! {
    /// Unique identifier for a single orchestrator run.
    RunId
}

uuid_id! {
    /// Unique identifier for a configured alert.
    AlertId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_new_and_as_str() {
        let t = Ticker::new("KXBTC-24DEC31");
        assert_eq!(t.as_str(), "KXBTC-24DEC31");
        assert_eq!(format!("{t}"), "KXBTC-24DEC31");
    }

    #[test]
    fn ticker_from_string_and_str() {
        assert_eq!(Ticker::from("a".to_string()), Ticker::from("a"));
    }

    #[test]
    fn thesis_id_generates_unique_uuids() {
        let a = ThesisId::new();
        let b = ThesisId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert_eq!(a.as_str().chars().filter(|c| *c == '-').count(), 4);
    }

    #[test]
    fn run_id_from_existing_string() {
        let id = RunId::from("existing-run");
        assert_eq!(id.as_str(), "existing-run");
    }
}
