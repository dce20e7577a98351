// =============================================================================
// Signal records
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MarketDirection;

/// Which increasing-market sub-case a signal matched.
///
/// Variants are declared in priority order: when several cases match the
/// same bar, `detect` reports the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalCase {
    /// Rising structure with a short pullback toward MA10.
    #[serde(rename = "1.a")]
    FallingMomentum,
    /// Rising structure while MA10 and MA20 converge and price moves sideways.
    #[serde(rename = "1.b")]
    SidewaysConvergence,
    /// Higher closes against a falling oscillator that turns up from oversold.
    #[serde(rename = "1.c")]
    OscillatorDivergence,
}

impl SignalCase {
    pub const ALL: [SignalCase; 3] = [
        SignalCase::FallingMomentum,
        SignalCase::SidewaysConvergence,
        SignalCase::OscillatorDivergence,
    ];

    /// Short label used in reports ("1.a", "1.b", "1.c").
    pub fn code(self) -> &'static str {
        match self {
            Self::FallingMomentum => "1.a",
            Self::SidewaysConvergence => "1.b",
            Self::OscillatorDivergence => "1.c",
        }
    }
}

impl std::fmt::Display for SignalCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One classified bar. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub case: SignalCase,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target: f64,
    /// Weekly context at the most recent completed week, if any.
    pub market_direction: Option<MarketDirection>,
    /// 0.0 ..= 1.0, from the MA10 / MA20 spread.
    pub signal_strength: Option<f64>,
}

impl Signal {
    /// Reward per unit of risk: (target - entry) / (entry - stop).
    pub fn reward_risk(&self) -> f64 {
        (self.target - self.entry_price) / (self.entry_price - self.stop_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn case_codes_and_serde_names() {
        assert_eq!(SignalCase::FallingMomentum.to_string(), "1.a");
        assert_eq!(
            serde_json::to_string(&SignalCase::OscillatorDivergence).unwrap(),
            "\"1.c\""
        );
        let parsed: SignalCase = serde_json::from_str("\"1.b\"").unwrap();
        assert_eq!(parsed, SignalCase::SidewaysConvergence);
    }

    #[test]
    fn cases_sort_by_priority() {
        let mut cases = vec![
            SignalCase::OscillatorDivergence,
            SignalCase::FallingMomentum,
            SignalCase::SidewaysConvergence,
        ];
        cases.sort();
        assert_eq!(cases, SignalCase::ALL.to_vec());
    }

    #[test]
    fn reward_risk_ratio() {
        let s = Signal {
            bar_index: 30,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            case: SignalCase::SidewaysConvergence,
            entry_price: 100.0,
            stop_loss: 95.0,
            target: 110.0,
            market_direction: Some(MarketDirection::Increasing),
            signal_strength: Some(0.4),
        };
        assert!((s.reward_risk() - 2.0).abs() < 1e-12);
    }
}
