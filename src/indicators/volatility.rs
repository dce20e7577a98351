// =============================================================================
// Volatility Estimators
// =============================================================================
//
// Three estimators over a rolling `window`, annualised by √252 (daily) or
// √52 (weekly):
//
//   Std          - sample std-dev of simple close-to-close returns
//   Garman-Klass - mean of 0.5·ln(H/L)² − (2·ln2 − 1)·ln(C/O)²
//   Parkinson    - mean of ln(H/L)² / (4·ln2)
//
// The range estimators scale the rolling mean directly. A bar whose log
// ratios are undefined (zero or negative prices) leaves every window that
// contains it undefined.
//
// Default window: 20 daily bars; the weekly variant divides by five.
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::series::{rolling_mean, rolling_percent_rank, rolling_sample_std, IndicatorSeries};
use crate::error::AnalysisError;
use crate::market_data::{aggregate_to_weekly, Bar, BarSeries};
use crate::types::Timeframe;

/// Which estimator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityMethod {
    #[default]
    Std,
    GarmanKlass,
    Parkinson,
}

impl FromStr for VolatilityMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "std" => Ok(Self::Std),
            "garman_klass" => Ok(Self::GarmanKlass),
            "parkinson" => Ok(Self::Parkinson),
            other => Err(AnalysisError::config(format!(
                "unknown volatility method `{other}` (expected std, garman_klass or parkinson)"
            ))),
        }
    }
}

impl std::fmt::Display for VolatilityMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Std => write!(f, "std"),
            Self::GarmanKlass => write!(f, "garman_klass"),
            Self::Parkinson => write!(f, "parkinson"),
        }
    }
}

fn default_window() -> usize {
    20
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatilityParams {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default)]
    pub method: VolatilityMethod,
}

impl Default for VolatilityParams {
    fn default() -> Self {
        Self {
            window: default_window(),
            method: VolatilityMethod::default(),
        }
    }
}

impl VolatilityParams {
    /// The weekly counterpart of daily parameters: window / 5, minimum 1.
    pub fn weekly(&self) -> Self {
        Self {
            window: (self.window / 5).max(1),
            method: self.method,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.window == 0 {
            return Err(AnalysisError::config("volatility window must be >= 1"));
        }
        Ok(())
    }
}

/// Annualised rolling volatility over `bars`.
pub fn calculate_volatility(
    bars: &[Bar],
    params: &VolatilityParams,
    timeframe: Timeframe,
) -> Result<IndicatorSeries, AnalysisError> {
    params.validate()?;

    let scale = timeframe.annualization();
    let raw = match params.method {
        VolatilityMethod::Std => {
            let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
            rolling_sample_std(&simple_returns(&closes), params.window)
        }
        VolatilityMethod::GarmanKlass => {
            let per_bar: Vec<Option<f64>> = bars.iter().map(garman_klass_term).collect();
            rolling_mean(&per_bar, params.window)
        }
        VolatilityMethod::Parkinson => {
            let per_bar: Vec<Option<f64>> = bars.iter().map(parkinson_term).collect();
            rolling_mean(&per_bar, params.window)
        }
    };

    Ok(IndicatorSeries::from_values(
        raw.into_iter().map(|v| v.map(|x| x * scale)).collect(),
    ))
}

/// Weekly volatility: aggregate, then apply `daily.weekly()` with √52.
pub fn calculate_weekly_volatility(
    daily: &BarSeries,
    daily_params: &VolatilityParams,
) -> Result<IndicatorSeries, AnalysisError> {
    let weekly = aggregate_to_weekly(daily);
    calculate_volatility(weekly.bars(), &daily_params.weekly(), Timeframe::Weekly)
}

/// Close-to-close volatility over a bare price series.
pub fn calculate_historical_volatility(
    closes: &[f64],
    window: usize,
    timeframe: Timeframe,
) -> Result<IndicatorSeries, AnalysisError> {
    if window == 0 {
        return Err(AnalysisError::config("historical volatility window must be >= 1"));
    }
    let scale = timeframe.annualization();
    Ok(IndicatorSeries::from_values(
        rolling_sample_std(&simple_returns(closes), window)
            .into_iter()
            .map(|v| v.map(|x| x * scale))
            .collect(),
    ))
}

/// Percentile rank in (0, 1] of each value within its trailing `window`.
/// A year of daily values is the usual window (252).
pub fn volatility_percentile(volatility: &IndicatorSeries, window: usize) -> IndicatorSeries {
    IndicatorSeries::from_values(rolling_percent_rank(volatility.values(), window))
}

/// Return into `i` from `i - 1`; undefined at 0 and after a zero close.
fn simple_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        if i == 0 || closes[i - 1] == 0.0 {
            out.push(None);
        } else {
            out.push(Some(closes[i] / closes[i - 1] - 1.0));
        }
    }
    out
}

fn log_ratio(num: f64, den: f64) -> Option<f64> {
    if num <= 0.0 || den <= 0.0 {
        return None;
    }
    let r = (num / den).ln();
    r.is_finite().then_some(r)
}

fn garman_klass_term(bar: &Bar) -> Option<f64> {
    let hl = log_ratio(bar.high, bar.low)?;
    let co = log_ratio(bar.close, bar.open)?;
    Some(0.5 * hl * hl - (2.0 * std::f64::consts::LN_2 - 1.0) * co * co)
}

fn parkinson_term(bar: &Bar) -> Option<f64> {
    let hl = log_ratio(bar.high, bar.low)?;
    Some(hl * hl / (4.0 * std::f64::consts::LN_2))
}

/// Current over historical volatility; undefined when historical is zero.
pub fn volatility_ratio(current: f64, historical: f64) -> Option<f64> {
    if historical == 0.0 {
        return None;
    }
    Some(current / historical)
}

/// Annualised volatility above `threshold` (0.30 = 30 %).
pub fn is_high_volatility(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v > threshold)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    fn constant_range(n: usize) -> Vec<Bar> {
        (0..n).map(|i| candle(i, 100.0, 110.0, 100.0, 105.0)).collect()
    }

    #[test]
    fn std_method_warm_up_and_scale() {
        // Alternating +1% / -1%-ish returns.
        let bars: Vec<Bar> = (0..30)
            .map(|i| {
                let c = if i % 2 == 0 { 100.0 } else { 101.0 };
                candle(i, c, c + 1.0, c - 1.0, c)
            })
            .collect();
        let params = VolatilityParams { window: 5, method: VolatilityMethod::Std };
        let vol = calculate_volatility(&bars, &params, Timeframe::Daily).unwrap();
        // Returns start at 1; five of them end at index 5.
        assert_eq!(vol.first_defined(), Some(5));

        let returns: Vec<f64> = (1..=5).map(|i| bars[i].close / bars[i - 1].close - 1.0).collect();
        let expected = crate::indicators::series::sample_std(&returns).unwrap() * 252f64.sqrt();
        assert!((vol.get(5).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn parkinson_constant_range() {
        let params = VolatilityParams { window: 10, method: VolatilityMethod::Parkinson };
        let vol = calculate_volatility(&constant_range(20), &params, Timeframe::Daily).unwrap();
        let term = (1.1f64).ln().powi(2) / (4.0 * std::f64::consts::LN_2);
        assert_eq!(vol.first_defined(), Some(9));
        assert!((vol.get(19).unwrap() - term * 252f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn garman_klass_constant_range() {
        let params = VolatilityParams { window: 10, method: VolatilityMethod::GarmanKlass };
        let vol = calculate_volatility(&constant_range(20), &params, Timeframe::Weekly).unwrap();
        let hl = (1.1f64).ln();
        let co = (1.05f64).ln();
        let term = 0.5 * hl * hl - (2.0 * std::f64::consts::LN_2 - 1.0) * co * co;
        assert!((vol.get(15).unwrap() - term * 52f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn zero_low_poisons_range_windows() {
        let mut bars = constant_range(12);
        bars[5] = candle(5, 0.0, 1.0, 0.0, 0.5);
        let params = VolatilityParams { window: 3, method: VolatilityMethod::Parkinson };
        let vol = calculate_volatility(&bars, &params, Timeframe::Daily).unwrap();
        assert!(vol.get(4).is_some());
        assert!(vol.get(5).is_none());
        assert!(vol.get(7).is_none());
        assert!(vol.get(8).is_some());
    }

    #[test]
    fn unknown_method_is_configuration_error() {
        assert_eq!("Parkinson".parse::<VolatilityMethod>().unwrap(), VolatilityMethod::Parkinson);
        assert!(matches!(
            "yang_zhang".parse::<VolatilityMethod>(),
            Err(AnalysisError::Configuration(_))
        ));
    }

    #[test]
    fn weekly_window_is_divided() {
        assert_eq!(VolatilityParams::default().weekly().window, 4);
        let daily = BarSeries::new(constant_range(50));
        let vol = calculate_weekly_volatility(&daily, &VolatilityParams::default()).unwrap();
        assert_eq!(vol.len(), 10);
        // Constant closes give zero returns, which is a defined zero.
        assert_eq!(vol.get(4), Some(0.0));
    }

    #[test]
    fn historical_matches_std_method() {
        let bars: Vec<Bar> = (0..40)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.9).sin() * 3.0;
                candle(i, c, c + 1.0, c - 1.0, c)
            })
            .collect();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let params = VolatilityParams { window: 10, method: VolatilityMethod::Std };
        let from_bars = calculate_volatility(&bars, &params, Timeframe::Daily).unwrap();
        let from_closes = calculate_historical_volatility(&closes, 10, Timeframe::Daily).unwrap();
        assert_eq!(from_bars, from_closes);
        assert_eq!(from_closes.first_defined(), Some(10));
        assert!(calculate_historical_volatility(&closes, 0, Timeframe::Daily).is_err());
    }

    #[test]
    fn percentile_of_rising_volatility() {
        let vol = IndicatorSeries::from_values(vec![None, Some(0.1), Some(0.2), Some(0.15), Some(0.3)]);
        let pct = volatility_percentile(&vol, 3);
        assert_eq!(pct.get(2), None);
        assert_eq!(pct.get(3), Some(2.0 / 3.0));
        assert_eq!(pct.get(4), Some(1.0));
    }

    #[test]
    fn ratio_and_threshold_helpers() {
        assert_eq!(volatility_ratio(0.2, 0.0), None);
        assert_eq!(volatility_ratio(0.3, 0.2).map(|r| (r * 10.0).round()), Some(15.0));
        assert!(is_high_volatility(Some(0.35), 0.30));
        assert!(!is_high_volatility(None, 0.30));
    }
}
