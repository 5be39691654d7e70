//! Quality profiles and scanner configuration.

use serde::Deserialize;

use crate::core::domain::Market;

/// A named bundle of quality filters applied before ranking.
#[derive(Debug, Clone, Deserialize)]
pub struct QualityProfile {
    pub name: String,
    /// Minimum 24h volume.
    pub min_volume_24h: i64,
    /// Maximum quoted spread in cents.
    pub max_spread_cents: f64,
    /// Minimum open interest.
    pub min_open_interest: i64,
}

impl QualityProfile {
    /// Loose filters for newly listed or early markets.
    #[must_use]
    pub fn early() -> Self {
        Self {
            name: "early".into(),
            min_volume_24h: 0,
            max_spread_cents: 50.0,
            min_open_interest: 0,
        }
    }

    /// Everyday filters.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            name: "standard".into(),
            min_volume_24h: 500,
            max_spread_cents: 15.0,
            min_open_interest: 100,
        }
    }

    /// Tight filters for actionable candidates only.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            name: "strict".into(),
            min_volume_24h: 5_000,
            max_spread_cents: 6.0,
            min_open_interest: 1_000,
        }
    }

    /// Resolve a profile by name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "early" => Some(Self::early()),
            "standard" => Some(Self::standard()),
            "strict" => Some(Self::strict()),
            _ => None,
        }
    }

    /// Default admission: priced, univariate, and inside the thresholds.
    #[must_use]
    pub fn admits(&self, market: &Market) -> bool {
        if !market.is_priced() || market.is_multivariate {
            return false;
        }
        if market.volume_24h < self.min_volume_24h {
            return false;
        }
        if market.open_interest < self.min_open_interest {
            return false;
        }
        match market.spread_cents() {
            Some(spread) => spread <= self.max_spread_cents,
            None => false,
        }
    }
}

/// Mode thresholds; defaults follow the documented scanner behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Inclusive midpoint band for close races.
    #[serde(default = "default_close_race_band")]
    pub close_race_band: (f64, f64),
    /// How far ahead "expiring soon" looks, in seconds.
    #[serde(default = "default_expiring_lookahead_secs")]
    pub expiring_lookahead_secs: i64,
    /// Minimum age of the comparison snapshot for movers, in seconds.
    #[serde(default = "default_movers_period_secs")]
    pub movers_period_secs: i64,
    /// Mispricing tolerance for arbitrage detection.
    #[serde(default = "default_arbitrage_epsilon")]
    pub arbitrage_epsilon: f64,
    /// Listing window for the new-markets scan, in seconds.
    #[serde(default = "default_new_markets_window_secs")]
    pub new_markets_window_secs: i64,
    /// Whether new-markets shows unpriced listings.
    #[serde(default)]
    pub include_unpriced_new: bool,
    /// Maximum results per scan.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_close_race_band() -> (f64, f64) {
    (0.40, 0.60)
}
fn default_expiring_lookahead_secs() -> i64 {
    48 * 3600
}
fn default_movers_period_secs() -> i64 {
    3600
}
fn default_arbitrage_epsilon() -> f64 {
    0.01
}
fn default_new_markets_window_secs() -> i64 {
    24 * 3600
}
fn default_limit() -> usize {
    25
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            close_race_band: default_close_race_band(),
            expiring_lookahead_secs: default_expiring_lookahead_secs(),
            movers_period_secs: default_movers_period_secs(),
            arbitrage_epsilon: default_arbitrage_epsilon(),
            new_markets_window_secs: default_new_markets_window_secs(),
            include_unpriced_new: false,
            limit: default_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::market;

    #[test]
    fn profiles_resolve_by_name() {
        assert_eq!(QualityProfile::by_name("early").unwrap().name, "early");
        assert_eq!(QualityProfile::by_name("strict").unwrap().name, "strict");
        assert!(QualityProfile::by_name("nope").is_none());
    }

    #[test]
    fn strict_profile_rejects_thin_markets() {
        let strict = QualityProfile::strict();
        let mut m = market("MKT-1", Some(48), Some(52));
        m.volume_24h = 100;
        m.open_interest = 50;
        assert!(!strict.admits(&m));

        m.volume_24h = 10_000;
        m.open_interest = 2_000;
        assert!(strict.admits(&m));
    }

    #[test]
    fn wide_spread_fails_standard_profile() {
        let standard = QualityProfile::standard();
        let mut m = market("MKT-1", Some(30), Some(55));
        m.volume_24h = 10_000;
        m.open_interest = 2_000;
        assert!(!standard.admits(&m));
    }
}
