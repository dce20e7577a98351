// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// SMA_t = mean(close_{t-window+1} ..= close_t)
//
// Positions before `window - 1` are undefined. The analyzer computes the 10-
// and 20-bar daily averages; their convergence ratio feeds the sideways case
// of the signal detector.
// =============================================================================

use super::series::{defined, rolling_mean, IndicatorSeries};
use crate::error::AnalysisError;
use crate::market_data::Bar;

/// Rolling mean of close over `window` bars.
pub fn calculate_sma(bars: &[Bar], window: usize) -> Result<IndicatorSeries, AnalysisError> {
    if window == 0 {
        return Err(AnalysisError::config("moving average window must be >= 1"));
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    Ok(IndicatorSeries::from_values(rolling_mean(&defined(&closes), window)))
}

/// Relative gap `|fast - slow| / slow`; undefined when `slow` is zero.
pub fn ma_convergence_pct(fast: f64, slow: f64) -> Option<f64> {
    if slow == 0.0 {
        return None;
    }
    let pct = (fast - slow).abs() / slow.abs();
    pct.is_finite().then_some(pct)
}

/// Whether the two averages are within `threshold_pct` of each other at `index`.
///
/// Fails closed: any undefined input yields `false`.
pub fn are_close(
    fast: &IndicatorSeries,
    slow: &IndicatorSeries,
    index: usize,
    threshold_pct: f64,
) -> bool {
    match (fast.get(index), slow.get(index)) {
        (Some(f), Some(s)) => ma_convergence_pct(f, s).is_some_and(|p| p <= threshold_pct),
        _ => false,
    }
}
