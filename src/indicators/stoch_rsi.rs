// =============================================================================
// Stochastic RSI
// =============================================================================
//
// Step 1: Price deltas from consecutive closes (index 0 has none).
// Step 2: gain = max(delta, 0), loss = max(-delta, 0); rolling means over
//          `rsi_window`.
// Step 3: RS = mean(gain) / mean(loss), RSI = 100 - 100 / (1 + RS).
//          Zero mean loss leaves RSI undefined rather than pinning it to 100.
// Step 4: %K_raw = 100 * (RSI - min) / (max - min) over `stoch_window`;
//          undefined when the window range is zero.
// Step 5: %K = mean(%K_raw, k_smooth), %D = mean(%K, d_smooth).
//
// Thresholds:  %K > 80 => OVERBOUGHT,  %K < 20 => OVERSOLD.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::series::{rolling_max, rolling_mean, rolling_min, IndicatorSeries};
use crate::error::AnalysisError;
use crate::market_data::{aggregate_to_weekly, Bar, BarSeries};

fn default_window() -> usize {
    14
}

fn default_smooth() -> usize {
    3
}

/// Oscillator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StochRsiParams {
    #[serde(default = "default_window")]
    pub rsi_window: usize,
    #[serde(default = "default_window")]
    pub stoch_window: usize,
    #[serde(default = "default_smooth")]
    pub k_smooth: usize,
    #[serde(default = "default_smooth")]
    pub d_smooth: usize,
}

impl Default for StochRsiParams {
    fn default() -> Self {
        Self {
            rsi_window: default_window(),
            stoch_window: default_window(),
            k_smooth: default_smooth(),
            d_smooth: default_smooth(),
        }
    }
}

impl StochRsiParams {
    /// Weekly parameters. Oscillator windows count bars of whatever period
    /// they run on, so they carry over unchanged.
    pub fn weekly(&self) -> Self {
        *self
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let windows = [
            ("rsi_window", self.rsi_window),
            ("stoch_window", self.stoch_window),
            ("k_smooth", self.k_smooth),
            ("d_smooth", self.d_smooth),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(AnalysisError::config(format!("stochastic RSI {name} must be >= 1")));
            }
        }
        Ok(())
    }
}

/// Buy or sell reading from a per-bar indicator rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossSignal {
    Buy,
    Sell,
}

/// RSI plus smoothed %K and %D lines, aligned with the source bars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StochRsi {
    pub rsi: IndicatorSeries,
    pub k: IndicatorSeries,
    pub d: IndicatorSeries,
}

impl StochRsi {
    pub fn len(&self) -> usize {
        self.k.len()
    }

    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }

    /// %K moved from at-or-below %D at `index - 1` to above it at `index`.
    pub fn crossed_above(&self, index: usize) -> bool {
        let Some(prev) = index.checked_sub(1) else {
            return false;
        };
        match (self.k.get(prev), self.d.get(prev), self.k.get(index), self.d.get(index)) {
            (Some(kp), Some(dp), Some(k), Some(d)) => kp <= dp && k > d,
            _ => false,
        }
    }

    /// %K moved from at-or-above %D at `index - 1` to below it at `index`.
    pub fn crossed_below(&self, index: usize) -> bool {
        let Some(prev) = index.checked_sub(1) else {
            return false;
        };
        match (self.k.get(prev), self.d.get(prev), self.k.get(index), self.d.get(index)) {
            (Some(kp), Some(dp), Some(k), Some(d)) => kp >= dp && k < d,
            _ => false,
        }
    }

    pub fn is_oversold(&self, index: usize, threshold: f64) -> bool {
        matches!((self.k.get(index), self.d.get(index)), (Some(k), Some(d)) if k < threshold && d < threshold)
    }

    pub fn is_overbought(&self, index: usize, threshold: f64) -> bool {
        matches!((self.k.get(index), self.d.get(index)), (Some(k), Some(d)) if k > threshold && d > threshold)
    }

    /// Buy on an upward cross below `oversold`, sell on a downward cross above
    /// `overbought`.
    pub fn crossover_signal(&self, index: usize, oversold: f64, overbought: f64) -> Option<CrossSignal> {
        let k = self.k.get(index)?;
        if self.crossed_above(index) && k < oversold {
            Some(CrossSignal::Buy)
        } else if self.crossed_below(index) && k > overbought {
            Some(CrossSignal::Sell)
        } else {
            None
        }
    }

    /// `crossover_signal` evaluated at every bar.
    pub fn crossover_signals(&self, oversold: f64, overbought: f64) -> Vec<Option<CrossSignal>> {
        (0..self.len())
            .map(|i| self.crossover_signal(i, oversold, overbought))
            .collect()
    }
}

/// RSI from rolling mean gain / loss over `window` deltas.
pub fn calculate_rsi(closes: &[f64], window: usize) -> IndicatorSeries {
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        if i == 0 {
            gains.push(None);
            losses.push(None);
            continue;
        }
        let delta = closes[i] - closes[i - 1];
        gains.push(Some(delta.max(0.0)));
        losses.push(Some((-delta).max(0.0)));
    }

    let avg_gain = rolling_mean(&gains, window);
    let avg_loss = rolling_mean(&losses, window);

    IndicatorSeries::from_values(
        avg_gain
            .into_iter()
            .zip(avg_loss)
            .map(|(g, l)| rsi_from_averages(g?, l?))
            .collect(),
    )
}

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// Zero average loss has no defined RS, so the position stays undefined.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        return None;
    }
    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    rsi.is_finite().then_some(rsi)
}

/// Full Stochastic RSI over `bars`.
pub fn calculate_stoch_rsi(bars: &[Bar], params: &StochRsiParams) -> Result<StochRsi, AnalysisError> {
    params.validate()?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let rsi = calculate_rsi(&closes, params.rsi_window);

    let lo = rolling_min(rsi.values(), params.stoch_window);
    let hi = rolling_max(rsi.values(), params.stoch_window);
    let k_raw: Vec<Option<f64>> = rsi
        .values()
        .iter()
        .zip(lo.iter().zip(hi.iter()))
        .map(|(r, (lo, hi))| {
            let (r, lo, hi) = ((*r)?, (*lo)?, (*hi)?);
            let range = hi - lo;
            if range == 0.0 {
                return None;
            }
            Some(100.0 * (r - lo) / range)
        })
        .collect();

    let k = clamp_percent(rolling_mean(&k_raw, params.k_smooth));
    let d = clamp_percent(rolling_mean(&k, params.d_smooth));

    Ok(StochRsi {
        rsi,
        k: IndicatorSeries::from_values(k),
        d: IndicatorSeries::from_values(d),
    })
}

/// Weekly Stochastic RSI: aggregate, then apply `daily.weekly()`.
pub fn calculate_weekly_stoch_rsi(
    daily: &BarSeries,
    daily_params: &StochRsiParams,
) -> Result<StochRsi, AnalysisError> {
    let weekly = aggregate_to_weekly(daily);
    calculate_stoch_rsi(weekly.bars(), &daily_params.weekly())
}

// Averages of values in [0, 100] can drift past the bounds by an ulp.
fn clamp_percent(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| v.map(|x| x.clamp(0.0, 100.0)))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0).unwrap(),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 100.0,
            })
            .collect()
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.45).sin() * 8.0 + (i as f64 * 0.13).cos() * 3.0 + i as f64 * 0.1)
            .collect()
    }

    // ---- calculate_rsi ---------------------------------------------------

    #[test]
    fn rsi_warm_up() {
        let rsi = calculate_rsi(&wavy(40), 14);
        assert_eq!(rsi.len(), 40);
        // First 14 deltas end at index 14.
        assert_eq!(rsi.first_defined(), Some(14));
    }

    #[test]
    fn rsi_all_gains_is_undefined() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        assert_eq!(calculate_rsi(&closes, 14).defined_count(), 0);
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let rsi = calculate_rsi(&closes, 14);
        for i in 14..30 {
            assert!(rsi.get(i).unwrap().abs() < 1e-10);
        }
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let rsi = calculate_rsi(&closes, 14);
        for v in rsi.values().iter().flatten() {
            assert!((0.0..=100.0).contains(v), "RSI {v} out of range");
        }
    }

    // ---- calculate_stoch_rsi ---------------------------------------------

    #[test]
    fn k_and_d_stay_in_range() {
        let s = calculate_stoch_rsi(&bars(&wavy(120)), &StochRsiParams::default()).unwrap();
        assert!(s.k.defined_count() > 0);
        assert!(s.d.defined_count() > 0);
        for v in s.k.values().iter().chain(s.d.values()).flatten() {
            assert!((0.0..=100.0).contains(v), "value {v} out of range");
        }
    }

    #[test]
    fn warm_up_chain() {
        let s = calculate_stoch_rsi(&bars(&wavy(120)), &StochRsiParams::default()).unwrap();
        // RSI from 14, raw %K from 27, %K from 29, %D from 31 (if no flat windows).
        assert_eq!(s.rsi.first_defined(), Some(14));
        assert_eq!(s.k.first_defined(), Some(29));
        assert_eq!(s.d.first_defined(), Some(31));
    }

    #[test]
    fn flat_rsi_window_is_undefined_not_nan() {
        // Constant step-down: RSI is exactly 0 everywhere, so max == min.
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let s = calculate_stoch_rsi(&bars(&closes), &StochRsiParams::default()).unwrap();
        assert!(s.rsi.defined_count() > 0);
        assert_eq!(s.k.defined_count(), 0);
        assert_eq!(s.d.defined_count(), 0);
    }

    #[test]
    fn zero_window_rejected() {
        let params = StochRsiParams { k_smooth: 0, ..StochRsiParams::default() };
        assert!(matches!(
            calculate_stoch_rsi(&bars(&wavy(30)), &params),
            Err(AnalysisError::Configuration(_))
        ));
    }

    #[test]
    fn crossover_detection() {
        let s = StochRsi {
            rsi: IndicatorSeries::undefined(3),
            k: IndicatorSeries::from_values(vec![Some(10.0), Some(5.0), Some(15.0)]),
            d: IndicatorSeries::from_values(vec![Some(12.0), Some(8.0), Some(9.0)]),
        };
        assert!(!s.crossed_above(0));
        assert!(!s.crossed_above(1));
        assert!(s.crossed_above(2));
        assert!(!s.crossed_below(2));
        assert_eq!(s.crossover_signal(2, 20.0, 80.0), Some(CrossSignal::Buy));
        assert_eq!(s.crossover_signal(1, 20.0, 80.0), None);
        assert!(s.is_oversold(1, 20.0));
        assert!(!s.is_overbought(1, 80.0));
    }

    #[test]
    fn crossover_signals_cover_every_bar() {
        let s = StochRsi {
            rsi: IndicatorSeries::undefined(5),
            k: IndicatorSeries::from_values(vec![None, Some(5.0), Some(15.0), Some(90.0), Some(85.0)]),
            d: IndicatorSeries::from_values(vec![None, Some(8.0), Some(9.0), Some(86.0), Some(88.0)]),
        };
        assert_eq!(
            s.crossover_signals(20.0, 80.0),
            vec![None, None, Some(CrossSignal::Buy), None, Some(CrossSignal::Sell)]
        );
        // Same crosses outside the extreme zones stay silent.
        assert!(s.crossover_signals(10.0, 95.0).iter().all(Option::is_none));
    }

    #[test]
    fn weekly_variant_runs_on_weekly_bars() {
        let daily = BarSeries::new(bars(&wavy(300)));
        let s = calculate_weekly_stoch_rsi(&daily, &StochRsiParams::default()).unwrap();
        assert_eq!(s.len(), 60);
    }
}
