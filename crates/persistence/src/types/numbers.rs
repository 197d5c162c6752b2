//! FHIR number values with implicit ranges.
//!
//! FHIR numbers carry an implicit precision: searching for `100` means
//! "anything that rounds to 100", i.e. the half-open range `[99.5, 100.5)`,
//! while `100.00` narrows that to `[99.995, 100.005)`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A parsed number search value with its implicit range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FhirNumber {
    value: f64,
    low: f64,
    high: f64,
}

impl FhirNumber {
    /// Creates a number with an explicit implicit-precision range.
    pub fn new(value: f64, range_low_incl: f64, range_high_excl: f64) -> Self {
        Self {
            value,
            low: range_low_incl,
            high: range_high_excl,
        }
    }

    /// Creates an integer-precision number: the range `[n-0.5, n+0.5)`.
    pub fn integer(value: i64) -> Self {
        let v = value as f64;
        Self::new(v, v - 0.5, v + 0.5)
    }

    /// The exact search value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Inclusive lower bound of the implicit range.
    pub fn range_low_incl(&self) -> f64 {
        self.low
    }

    /// Exclusive upper bound of the implicit range.
    pub fn range_high_excl(&self) -> f64 {
        self.high
    }
}

impl FromStr for FhirNumber {
    type Err = String;

    /// Parses a decimal literal, deriving the implicit range from the
    /// number of fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s.parse().map_err(|_| format!("invalid number: {s}"))?;
        let fraction_digits = s.split('.').nth(1).map_or(0, str::len);
        let delta = 0.5 * 10f64.powi(-(fraction_digits as i32));
        Ok(Self::new(value, value - delta, value + delta))
    }
}
