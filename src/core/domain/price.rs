//! Fixed-point price representation.
//!
//! Wire payloads carry prices both as deprecated integer cents and as dollar
//! strings with up to six decimals. Both normalize here, once, to integer
//! hundredths of a cent: `1_000_000 == $100.00`. All downstream code sees
//! this single representation.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Units per dollar: hundredths of a cent.
pub const UNITS_PER_DOLLAR: i64 = 10_000;

/// Units per cent.
pub const UNITS_PER_CENT: i64 = 100;

/// A price (or any dollar amount) in fixed-point hundredths of a cent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PriceUnits(i64);

impl PriceUnits {
    pub const ZERO: Self = Self(0);

    /// One dollar, the payout of a binary contract.
    pub const DOLLAR: Self = Self(UNITS_PER_DOLLAR);

    /// Construct from raw units.
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// Construct from whole cents (the deprecated wire representation).
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents * UNITS_PER_CENT)
    }

    /// Parse a dollar string from the wire.
    ///
    /// The accepted pattern is `[0-9]+(\.[0-9]{1,6})?`. Values finer than a
    /// hundredth of a cent round half-even.
    pub fn parse_dollars(s: &str) -> Result<Self> {
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        let int_ok = !int_part.is_empty() && int_part.bytes().all(|b| b.is_ascii_digit());
        let frac_ok = if s.contains('.') {
            !frac_part.is_empty()
                && frac_part.len() <= 6
                && frac_part.bytes().all(|b| b.is_ascii_digit())
        } else {
            true
        };
        if !int_ok || !frac_ok {
            return Err(Error::Validation(format!("malformed price string: {s:?}")));
        }

        let dollars: i64 = int_part
            .parse()
            .map_err(|_| Error::Validation(format!("price out of range: {s:?}")))?;

        // Scale the fraction to micro-dollars, then round to units (100 micro).
        let mut micro: i64 = 0;
        for (i, b) in frac_part.bytes().enumerate() {
            micro += i64::from(b - b'0') * 10_i64.pow(5 - i as u32);
        }

        let quot = micro / 100;
        let rem = micro % 100;
        let rounded = match rem.cmp(&50) {
            std::cmp::Ordering::Less => quot,
            std::cmp::Ordering::Greater => quot + 1,
            std::cmp::Ordering::Equal => {
                if quot % 2 == 0 {
                    quot
                } else {
                    quot + 1
                }
            }
        };

        dollars
            .checked_mul(UNITS_PER_DOLLAR)
            .and_then(|d| d.checked_add(rounded))
            .map(Self)
            .ok_or_else(|| Error::Validation(format!("price out of range: {s:?}")))
    }

    /// Raw units.
    #[must_use]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Price in cents, exact only when the value is a whole number of cents.
    #[must_use]
    pub fn cents(&self) -> f64 {
        self.0 as f64 / UNITS_PER_CENT as f64
    }

    /// Whole cents when the value has no sub-cent component.
    #[must_use]
    pub fn whole_cents(&self) -> Option<i64> {
        (self.0 % UNITS_PER_CENT == 0).then_some(self.0 / UNITS_PER_CENT)
    }

    /// Value as decimal dollars.
    #[must_use]
    pub fn to_dollars(&self) -> Decimal {
        Decimal::new(self.0, 4)
    }

    /// Implied probability of a binary contract priced at this value.
    #[must_use]
    pub fn probability(&self) -> f64 {
        self.0 as f64 / UNITS_PER_DOLLAR as f64
    }

    /// The complement price: `$1 - self`. Meaningful for binary quotes only.
    #[must_use]
    pub const fn complement(&self) -> Self {
        Self(UNITS_PER_DOLLAR - self.0)
    }

    #[must_use]
    pub const fn saturating_sub(&self, other: Self) -> Self {
        let diff = self.0 - other.0;
        Self(if diff < 0 { 0 } else { diff })
    }
}

impl fmt::Display for PriceUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.to_dollars())
    }
}

impl std::ops::Add for PriceUnits {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for PriceUnits {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}
