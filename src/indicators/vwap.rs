// =============================================================================
// Volume-Weighted Average Price (VWAP)
// =============================================================================
//
// typical = (H + L + C) / 3
// Cumulative:  VWAP_t = Σ_{0..=t} vol·typical / Σ_{0..=t} vol
// Rolling(w):  VWAP_t = Σ_{t-w+1..=t} vol·typical / Σ_{t-w+1..=t} vol
//
// A zero-volume bar adds nothing to either sum, so cumulative VWAP simply
// carries the previous value. A zero denominator (no volume yet, or a fully
// silent rolling window) is undefined.
//
// Derived readings over a finished VWAP line: σ bands of the line itself,
// trend against its own moving average, and deviation signals.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::series::{defined, rolling_mean, rolling_sample_std, rolling_sum, IndicatorSeries};
use super::stoch_rsi::CrossSignal;
use crate::error::AnalysisError;
use crate::market_data::{aggregate_to_weekly, Bar, BarSeries};
use crate::types::MarketDirection;

/// How far back the sums reach. The two modes are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VwapMode {
    /// Running sums from the first bar.
    #[default]
    Cumulative,
    /// Sums over the last `n` bars.
    Rolling(usize),
}

impl VwapMode {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        match self {
            Self::Rolling(0) => Err(AnalysisError::config("rolling VWAP window must be >= 1")),
            _ => Ok(()),
        }
    }
}

/// VWAP over `bars` in the given mode.
pub fn calculate_vwap(bars: &[Bar], mode: VwapMode) -> Result<IndicatorSeries, AnalysisError> {
    mode.validate()?;

    let values = match mode {
        VwapMode::Cumulative => {
            let mut cum_pv = 0.0;
            let mut cum_v = 0.0;
            bars.iter()
                .map(|b| {
                    cum_pv += b.volume * b.typical_price();
                    cum_v += b.volume;
                    ratio(cum_pv, cum_v)
                })
                .collect()
        }
        VwapMode::Rolling(window) => {
            let pv: Vec<f64> = bars.iter().map(|b| b.volume * b.typical_price()).collect();
            let v: Vec<f64> = bars.iter().map(|b| b.volume).collect();
            let sum_pv = rolling_sum(&defined(&pv), window);
            let sum_v = rolling_sum(&defined(&v), window);
            sum_pv
                .into_iter()
                .zip(sum_v)
                .map(|(pv, v)| ratio(pv?, v?))
                .collect()
        }
    };

    Ok(IndicatorSeries::from_values(values))
}

/// Weekly VWAP in the same mode over aggregated bars.
pub fn calculate_weekly_vwap(daily: &BarSeries, mode: VwapMode) -> Result<IndicatorSeries, AnalysisError> {
    let weekly = aggregate_to_weekly(daily);
    calculate_vwap(weekly.bars(), mode)
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

/// Percentage distance of `price` from `vwap`.
pub fn deviation_pct(price: f64, vwap: f64) -> Option<f64> {
    if vwap == 0.0 {
        return None;
    }
    Some((price - vwap) / vwap * 100.0)
}

pub fn is_price_above_vwap(price: f64, vwap: Option<f64>) -> bool {
    vwap.is_some_and(|v| price > v)
}

pub fn is_price_below_vwap(price: f64, vwap: Option<f64>) -> bool {
    vwap.is_some_and(|v| price < v)
}

/// Buy when a price sits more than `threshold_pct` percent below VWAP, sell
/// when it sits more than that above. Index-aligned with `prices`.
pub fn deviation_signals(prices: &[f64], vwap: &IndicatorSeries, threshold_pct: f64) -> Vec<Option<CrossSignal>> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let dev = deviation_pct(p, vwap.get(i)?)?;
            if dev < -threshold_pct {
                Some(CrossSignal::Buy)
            } else if dev > threshold_pct {
                Some(CrossSignal::Sell)
            } else {
                None
            }
        })
        .collect()
}

/// VWAP line with `num_std` rolling sample deviations of the line on each side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VwapBands {
    pub upper: IndicatorSeries,
    pub vwap: IndicatorSeries,
    pub lower: IndicatorSeries,
}

pub fn calculate_vwap_bands(
    vwap: &IndicatorSeries,
    window: usize,
    num_std: f64,
) -> Result<VwapBands, AnalysisError> {
    if window == 0 {
        return Err(AnalysisError::config("VWAP band window must be >= 1"));
    }
    if !num_std.is_finite() || num_std < 0.0 {
        return Err(AnalysisError::config(format!(
            "VWAP band num_std must be finite and >= 0, got {num_std}"
        )));
    }
    let std = IndicatorSeries::from_values(rolling_sample_std(vwap.values(), window));
    Ok(VwapBands {
        upper: vwap.zip_with(&std, |v, s| v + num_std * s),
        lower: vwap.zip_with(&std, |v, s| v - num_std * s),
        vwap: vwap.clone(),
    })
}

/// Direction of VWAP against its own `window`-bar mean. Undefined until
/// both exist.
pub fn vwap_trend(vwap: &IndicatorSeries, window: usize) -> Vec<Option<MarketDirection>> {
    let ma = rolling_mean(vwap.values(), window);
    vwap.values()
        .iter()
        .zip(ma)
        .map(|(v, m)| {
            let (v, m) = ((*v)?, m?);
            Some(if v > m {
                MarketDirection::Increasing
            } else if v < m {
                MarketDirection::Decreasing
            } else {
                MarketDirection::Sideways
            })
        })
        .collect()
}
