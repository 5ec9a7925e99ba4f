//! Hash rate value type.

use serde::{Deserialize, Serialize};
use std::fmt;

const UNITS: [&str; 6] = ["H/s", "KH/s", "MH/s", "GH/s", "TH/s", "PH/s"];

/// Hashes per second, as estimated by the pool.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct HashRate(pub f64);

impl HashRate {
    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Format as human-readable string with appropriate units
    pub fn to_human_readable(&self) -> String {
        let mut value = if self.0.is_finite() { self.0.max(0.0) } else { 0.0 };
        let mut unit = 0;
        while value >= 1000.0 && unit < UNITS.len() - 1 {
            value /= 1000.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{:.0} {}", value, UNITS[unit])
        } else {
            format!("{:.2} {}", value, UNITS[unit])
        }
    }
}

impl From<f64> for HashRate {
    fn from(hashes_per_second: f64) -> Self {
        Self(hashes_per_second)
    }
}

impl fmt::Display for HashRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_readable_units() {
        assert_eq!(HashRate(0.0).to_string(), "0 H/s");
        assert_eq!(HashRate(999.0).to_string(), "999 H/s");
        assert_eq!(HashRate(1_500.0).to_string(), "1.50 KH/s");
        assert_eq!(HashRate(1_500_000.0).to_string(), "1.50 MH/s");
        assert_eq!(HashRate(2_000_000_000_000.0).to_string(), "2.00 TH/s");
        assert_eq!(HashRate(5e18).to_string(), "5000.00 PH/s");
    }

    #[test]
    fn test_non_finite_is_zero() {
        assert_eq!(HashRate(f64::NAN).to_string(), "0 H/s");
        assert_eq!(HashRate(-10.0).to_string(), "0 H/s");
    }
}
