//! Market scanning: close races, movers, arbitrage, and new listings.
//!
//! All scans are pure functions over already-fetched market data; the store
//! and client supply inputs. Thresholds live in explicit configuration
//! objects rather than scattered constants.

mod profile;

pub use profile::{QualityProfile, ScannerConfig};

use chrono::{DateTime, Duration, Utc};

use crate::core::domain::{Market, PriceSnapshot, Ticker};

/// One ranked scan result.
#[derive(Debug, Clone)]
pub struct ScanHit {
    pub ticker: Ticker,
    pub title: String,
    pub midpoint: Option<f64>,
    pub spread_cents: Option<f64>,
    pub volume_24h: i64,
    /// Mode-specific ranking score; higher is better.
    pub score: f64,
    /// Annotation for unpriced new listings.
    pub label: Option<String>,
    /// Absolute midpoint change for mover hits.
    pub change: Option<f64>,
}

impl ScanHit {
    fn from_market(market: &Market, score: f64) -> Self {
        Self {
            ticker: market.ticker.clone(),
            title: market.title.clone(),
            midpoint: market.midpoint(),
            spread_cents: market.spread_cents(),
            volume_24h: market.volume_24h,
            score,
            label: None,
            change: None,
        }
    }
}

fn truncate(mut hits: Vec<ScanHit>, limit: usize) -> Vec<ScanHit> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}

/// Close-race scan: markets whose midpoint falls inside the configured band
/// (inclusive bounds), ranked by a blend of closeness, volume, and spread.
#[must_use]
pub fn close_race(
    markets: &[Market],
    profile: &QualityProfile,
    config: &ScannerConfig,
) -> Vec<ScanHit> {
    let (lo, hi) = config.close_race_band;
    let hits = markets
        .iter()
        .filter(|m| profile.admits(m))
        .filter_map(|m| {
            let mid = m.midpoint()?;
            if !(lo..=hi).contains(&mid) {
                return None;
            }
            let spread = m.spread_cents().unwrap_or(20.0);
            let score = 0.5 * (1.0 - (2.0 * mid - 1.0).abs())
                + 0.3 * ((m.volume_24h as f64 + 1.0).log10() / 6.0)
                + 0.2 * (1.0 - spread.min(20.0) / 20.0);
            Some(ScanHit::from_market(m, score))
        })
        .collect();
    truncate(hits, config.limit)
}

/// High-volume scan: rank by 24h volume, placeholders filtered.
#[must_use]
pub fn high_volume(
    markets: &[Market],
    profile: &QualityProfile,
    config: &ScannerConfig,
) -> Vec<ScanHit> {
    let hits = markets
        .iter()
        .filter(|m| profile.admits(m))
        .map(|m| ScanHit::from_market(m, m.volume_24h as f64))
        .collect();
    truncate(hits, config.limit)
}

/// Wide-spread scan: rank by quoted spread, placeholders filtered.
#[must_use]
pub fn wide_spread(
    markets: &[Market],
    profile: &QualityProfile,
    config: &ScannerConfig,
) -> Vec<ScanHit> {
    let hits = markets
        .iter()
        .filter(|m| profile.admits(m))
        .filter_map(|m| {
            let spread = m.spread_cents()?;
            Some(ScanHit::from_market(m, spread))
        })
        .collect();
    truncate(hits, config.limit)
}

/// Markets closing within the lookahead window, soonest first.
#[must_use]
pub fn expiring_soon(
    markets: &[Market],
    now: DateTime<Utc>,
    profile: &QualityProfile,
    config: &ScannerConfig,
) -> Vec<ScanHit> {
    let horizon = now + Duration::seconds(config.expiring_lookahead_secs);
    let hits = markets
        .iter()
        .filter(|m| profile.admits(m))
        .filter_map(|m| {
            let close = m.close_time?;
            if close <= now || close > horizon {
                return None;
            }
            // Sooner close = higher score.
            let secs_left = (close - now).num_seconds().max(1) as f64;
            Some(ScanHit::from_market(m, 1.0 / secs_left))
        })
        .collect();
    truncate(hits, config.limit)
}

/// Movers: rank by absolute midpoint change against a prior snapshot.
///
/// `prior` must hold, per ticker, the latest stored snapshot at least the
/// configured period old; markets without one are skipped.
#[must_use]
pub fn movers(
    markets: &[Market],
    prior: &std::collections::HashMap<Ticker, PriceSnapshot>,
    profile: &QualityProfile,
    config: &ScannerConfig,
) -> Vec<ScanHit> {
    let hits = markets
        .iter()
        .filter(|m| profile.admits(m))
        .filter_map(|m| {
            let now_mid = m.midpoint()?;
            let then_mid = prior.get(&m.ticker)?.midpoint()?;
            let change = now_mid - then_mid;
            let mut hit = ScanHit::from_market(m, change.abs());
            hit.change = Some(change);
            Some(hit)
        })
        .collect();
    truncate(hits, config.limit)
}

/// One arbitrage opportunity across a set of complementary markets.
#[derive(Debug, Clone)]
pub struct ArbitrageHit {
    pub tickers: Vec<Ticker>,
    /// Sum of YES bids as implied probability.
    pub total_yes: f64,
    /// `total_yes - 1.0`, the gross edge from selling the set.
    pub edge: f64,
}

/// Scan complement sets (an event's markets, or a user-supplied set) for
/// `sum(p_yes) > 1 + epsilon`.
#[must_use]
pub fn arbitrage(groups: &[Vec<Market>], epsilon: f64) -> Vec<ArbitrageHit> {
    let mut hits: Vec<ArbitrageHit> = groups
        .iter()
        .filter(|group| group.len() >= 2 && group.iter().all(Market::is_priced))
        .filter_map(|group| {
            let total_yes: f64 = group
                .iter()
                .map(|m| m.yes_bid.map(|p| p.probability()).unwrap_or(0.0))
                .sum();
            if total_yes > 1.0 + epsilon {
                Some(ArbitrageHit {
                    tickers: group.iter().map(|m| m.ticker.clone()).collect(),
                    total_yes,
                    edge: total_yes - 1.0,
                })
            } else {
                None
            }
        })
        .collect();
    hits.sort_by(|a, b| b.edge.partial_cmp(&a.edge).unwrap_or(std::cmp::Ordering::Equal));
    hits
}

/// Label applied to `(0, 100)` placeholder quotes.
pub const AWAITING_PRICE_DISCOVERY: &str = "[AWAITING PRICE DISCOVERY]";
/// Label applied to `(0, 0)` quotes.
pub const NO_QUOTES: &str = "[NO QUOTES]";

/// New listings: markets created (falling back to opened) within the window,
/// newest first. Unpriced markets appear only behind the config flag, with
/// a label distinguishing placeholder quotes from missing quotes.
#[must_use]
pub fn new_markets(
    markets: &[Market],
    now: DateTime<Utc>,
    profile: &QualityProfile,
    config: &ScannerConfig,
) -> Vec<ScanHit> {
    let window_start = now - Duration::seconds(config.new_markets_window_secs);
    let hits = markets
        .iter()
        .filter(|m| !m.is_multivariate)
        .filter_map(|m| {
            let listed = m.created_time.or(m.open_time)?;
            if listed < window_start || listed > now {
                return None;
            }

            let label = if m.is_priced() {
                None
            } else if !config.include_unpriced_new {
                return None;
            } else {
                use crate::core::domain::PriceUnits;
                match (m.yes_bid, m.yes_ask) {
                    (Some(bid), Some(ask))
                        if bid == PriceUnits::ZERO && ask == PriceUnits::DOLLAR =>
                    {
                        Some(AWAITING_PRICE_DISCOVERY.to_string())
                    }
                    _ => Some(NO_QUOTES.to_string()),
                }
            };

            if m.is_priced() && !profile.admits(m) {
                return None;
            }

            let age_secs = (now - listed).num_seconds().max(1) as f64;
            let mut hit = ScanHit::from_market(m, 1.0 / age_secs);
            hit.label = label;
            Some(hit)
        })
        .collect();
    truncate(hits, config.limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::market;
    use std::collections::HashMap;

    fn priced(ticker: &str, bid: i64, ask: i64, volume_24h: i64) -> Market {
        let mut m = market(ticker, Some(bid), Some(ask));
        m.volume_24h = volume_24h;
        m.open_interest = 5_000;
        m
    }

    #[test]
    fn close_race_band_is_inclusive() {
        let config = ScannerConfig::default();
        let profile = QualityProfile::early();
        // Midpoints exactly at 0.40 and 0.60 are included.
        let markets = vec![
            priced("AT-LOW", 38, 42, 10_000),
            priced("AT-HIGH", 58, 62, 10_000),
            priced("OUTSIDE", 70, 74, 10_000),
        ];
        let hits = close_race(&markets, &profile, &config);
        let tickers: Vec<&str> = hits.iter().map(|h| h.ticker.as_str()).collect();
        assert!(tickers.contains(&"AT-LOW"));
        assert!(tickers.contains(&"AT-HIGH"));
        assert!(!tickers.contains(&"OUTSIDE"));
    }

    #[test]
    fn close_race_ranks_tighter_races_higher() {
        let config = ScannerConfig::default();
        let profile = QualityProfile::early();
        let markets = vec![
            priced("DEAD-HEAT", 49, 51, 1_000),
            priced("LEANING", 42, 44, 1_000),
        ];
        let hits = close_race(&markets, &profile, &config);
        assert_eq!(hits[0].ticker.as_str(), "DEAD-HEAT");
    }

    #[test]
    fn unpriced_markets_are_skipped_by_default_modes() {
        let config = ScannerConfig::default();
        let profile = QualityProfile::early();
        let placeholder = market("NEW", Some(0), Some(100));
        let hits = high_volume(&[placeholder], &profile, &config);
        assert!(hits.is_empty());
    }

    #[test]
    fn multivariate_markets_are_excluded_from_opportunity_scans() {
        let config = ScannerConfig::default();
        let profile = QualityProfile::early();
        let mut m = priced("MVE", 48, 52, 50_000);
        m.is_multivariate = true;
        assert!(close_race(&[m], &profile, &config).is_empty());
    }

    #[test]
    fn movers_require_a_prior_snapshot() {
        let config = ScannerConfig::default();
        let profile = QualityProfile::early();
        let markets = vec![priced("MOVED", 58, 62, 10_000), priced("NO-HISTORY", 48, 52, 10_000)];

        let mut prior = HashMap::new();
        prior.insert(
            Ticker::from("MOVED"),
            crate::testkit::snapshot("MOVED", 40, 44),
        );

        let hits = movers(&markets, &prior, &profile, &config);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ticker.as_str(), "MOVED");
        assert!((hits[0].change.unwrap() - 0.18).abs() < 1e-9);
    }

    #[test]
    fn arbitrage_flags_overpriced_complements() {
        let group = vec![
            priced("OUT-A", 40, 42, 1_000),
            priced("OUT-B", 35, 37, 1_000),
            priced("OUT-C", 30, 32, 1_000),
        ];
        // Sum of YES bids = 1.05 > 1 + 0.01.
        let hits = arbitrage(&[group], 0.01);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].edge - 0.05).abs() < 1e-9);
    }

    #[test]
    fn arbitrage_ignores_fairly_priced_sets() {
        let group = vec![priced("OUT-A", 50, 52, 1_000), priced("OUT-B", 45, 47, 1_000)];
        assert!(arbitrage(&[group], 0.01).is_empty());
    }

    #[test]
    fn new_markets_labels_unpriced_when_flagged() {
        let mut config = ScannerConfig::default();
        config.include_unpriced_new = true;
        let profile = QualityProfile::early();
        let now = Utc::now();

        let mut awaiting = market("AWAITING", Some(0), Some(100));
        awaiting.created_time = Some(now - Duration::hours(1));
        let mut silent = market("SILENT", Some(0), Some(0));
        silent.created_time = Some(now - Duration::hours(2));
        let mut old = market("OLD", Some(0), Some(100));
        old.created_time = Some(now - Duration::days(30));

        let hits = new_markets(&[awaiting, silent, old], now, &profile, &config);
        assert_eq!(hits.len(), 2);
        let by_ticker: HashMap<&str, &ScanHit> =
            hits.iter().map(|h| (h.ticker.as_str(), h)).collect();
        assert_eq!(
            by_ticker["AWAITING"].label.as_deref(),
            Some(AWAITING_PRICE_DISCOVERY)
        );
        assert_eq!(by_ticker["SILENT"].label.as_deref(), Some(NO_QUOTES));
    }

    #[test]
    fn new_markets_hides_unpriced_without_flag() {
        let config = ScannerConfig::default();
        let profile = QualityProfile::early();
        let now = Utc::now();
        let mut awaiting = market("AWAITING", Some(0), Some(100));
        awaiting.created_time = Some(now - Duration::hours(1));
        assert!(new_markets(&[awaiting], now, &profile, &config).is_empty());
    }

    #[test]
    fn new_markets_falls_back_to_open_time() {
        let config = ScannerConfig::default();
        let profile = QualityProfile::early();
        let now = Utc::now();
        let mut m = priced("OPENED", 48, 52, 10_000);
        m.created_time = None;
        m.open_time = Some(now - Duration::hours(3));
        let hits = new_markets(&[m], now, &profile, &config);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn expiring_soon_orders_by_imminence() {
        let config = ScannerConfig::default();
        let profile = QualityProfile::early();
        let now = Utc::now();
        let mut soon = priced("SOON", 48, 52, 10_000);
        soon.close_time = Some(now + Duration::hours(2));
        let mut later = priced("LATER", 48, 52, 10_000);
        later.close_time = Some(now + Duration::hours(20));
        let mut far = priced("FAR", 48, 52, 10_000);
        far.close_time = Some(now + Duration::days(30));

        let hits = expiring_soon(&[later, soon, far], now, &profile, &config);
        let tickers: Vec<&str> = hits.iter().map(|h| h.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["SOON", "LATER"]);
    }
}
