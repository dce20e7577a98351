// =============================================================================
// Shared types used across the analysis engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Bar period an indicator series was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Daily,
    Weekly,
}

impl Timeframe {
    /// Trading periods per year for this timeframe.
    pub fn periods_per_year(self) -> f64 {
        match self {
            Self::Daily => 252.0,
            Self::Weekly => 52.0,
        }
    }

    /// Square-root-of-time factor used to annualise volatility estimates.
    pub fn annualization(self) -> f64 {
        self.periods_per_year().sqrt()
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "Daily"),
            Self::Weekly => write!(f, "Weekly"),
        }
    }
}

/// Higher-timeframe market context attached to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketDirection {
    Increasing,
    Sideways,
    Decreasing,
}

impl std::fmt::Display for MarketDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increasing => write!(f, "INCREASING"),
            Self::Sideways => write!(f, "SIDEWAYS"),
            Self::Decreasing => write!(f, "DECREASING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annualization_factors() {
        assert!((Timeframe::Daily.annualization() - 252f64.sqrt()).abs() < 1e-12);
        assert!((Timeframe::Weekly.annualization() - 52f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn direction_display() {
        assert_eq!(MarketDirection::Increasing.to_string(), "INCREASING");
        assert_eq!(Timeframe::Weekly.to_string(), "Weekly");
    }
}
