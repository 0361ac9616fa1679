//! Exact currency amounts.
//!
//! Prices are held as integer cents so that range filters and equality are
//! exact. On the wire a price is a plain JSON number (`120.0`); on input both
//! numbers and decimal strings (`"120.00"`) are accepted.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Largest accepted amount, in cents. Far above any listing limit, well
/// inside the range where `f64` still represents every cent.
const MAX_CENTS: i64 = 1_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("price must be a finite number")]
    NotFinite,

    #[error("price cannot be negative")]
    Negative,

    #[error("price has more than two decimal places")]
    TooPrecise,

    #[error("price is out of range")]
    OutOfRange,

    #[error("'{0}' is not a valid amount")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        if cents < 0 {
            return Err(PriceError::Negative);
        }
        if cents > MAX_CENTS {
            return Err(PriceError::OutOfRange);
        }
        Ok(Self(cents))
    }

    /// Whole francs, e.g. `Price::from_francs(120)` is 120.00.
    pub fn from_francs(francs: i64) -> Result<Self, PriceError> {
        let cents = francs.checked_mul(100).ok_or(PriceError::OutOfRange)?;
        Self::from_cents(cents)
    }

    pub fn from_f64(value: f64) -> Result<Self, PriceError> {
        if !value.is_finite() {
            return Err(PriceError::NotFinite);
        }
        if value < 0.0 {
            return Err(PriceError::Negative);
        }
        let scaled = value * 100.0;
        if scaled > MAX_CENTS as f64 {
            return Err(PriceError::OutOfRange);
        }
        let cents = scaled.round();
        // 19.99 * 100 is 1998.9999999999998; anything further off had a third decimal.
        if (scaled - cents).abs() > 1e-6 {
            return Err(PriceError::TooPrecise);
        }
        Self::from_cents(cents as i64)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let malformed = || PriceError::Malformed(s.to_string());

        if trimmed.starts_with('-') {
            return Err(PriceError::Negative);
        }

        let (whole, frac) = match trimmed.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (trimmed, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if frac.len() > 2 {
            return Err(PriceError::TooPrecise);
        }
        if trimmed.ends_with('.') {
            return Err(malformed());
        }

        let francs: i64 = whole.parse().map_err(|_| PriceError::OutOfRange)?;
        let frac_cents = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| malformed())? * 10,
            _ => frac.parse::<i64>().map_err(|_| malformed())?,
        };

        let cents = francs
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or(PriceError::OutOfRange)?;
        Self::from_cents(cents)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PriceVisitor)
    }
}

struct PriceVisitor;

impl Visitor<'_> for PriceVisitor {
    type Value = Price;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative amount as a number or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
        let francs = i64::try_from(v).map_err(|_| E::custom(PriceError::OutOfRange))?;
        Price::from_francs(francs).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
        Price::from_francs(v).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
        Price::from_f64(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
        v.parse().map_err(E::custom)
    }
}
