// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), where σ is the rolling sample standard
// deviation of close.
//
// Daily defaults: window 20, k 2.0. The weekly variant divides the window by
// five (minimum 1) and keeps k. A window of 1 has no sample deviation, so its
// bands are undefined everywhere.

use serde::{Deserialize, Serialize};

use super::series::{defined, rolling_mean, rolling_percent_rank, rolling_sample_std, IndicatorSeries};
use super::stoch_rsi::CrossSignal;
use crate::error::AnalysisError;
use crate::market_data::{aggregate_to_weekly, Bar, BarSeries};

fn default_window() -> usize {
    20
}

fn default_num_std() -> f64 {
    2.0
}

/// Band parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerParams {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_num_std")]
    pub num_std: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            window: default_window(),
            num_std: default_num_std(),
        }
    }
}

impl BollingerParams {
    /// The weekly counterpart of daily parameters.
    pub fn weekly(&self) -> Self {
        Self {
            window: (self.window / 5).max(1),
            num_std: self.num_std,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.window == 0 {
            return Err(AnalysisError::config("bollinger window must be >= 1"));
        }
        if !self.num_std.is_finite() || self.num_std < 0.0 {
            return Err(AnalysisError::config(format!(
                "bollinger num_std must be finite and >= 0, got {}",
                self.num_std
            )));
        }
        Ok(())
    }
}

/// Upper / middle / lower band series, aligned with the source bars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
}

impl BollingerBands {
    pub fn len(&self) -> usize {
        self.middle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middle.is_empty()
    }

    /// Normalised band width `(upper - lower) / middle`.
    pub fn width(&self, index: usize) -> Option<f64> {
        let (u, m, l) = (self.upper.get(index)?, self.middle.get(index)?, self.lower.get(index)?);
        if m == 0.0 {
            return None;
        }
        Some((u - l) / m)
    }

    /// Position of `price` inside the bands: 0 at the lower band, 1 at the upper.
    pub fn percent_b(&self, index: usize, price: f64) -> Option<f64> {
        let (u, l) = (self.upper.get(index)?, self.lower.get(index)?);
        if u == l {
            return None;
        }
        Some((price - l) / (u - l))
    }

    /// Band width below `threshold` (low-volatility compression).
    pub fn is_squeeze(&self, index: usize, threshold: f64) -> bool {
        self.width(index).is_some_and(|w| w < threshold)
    }

    /// Sell when `price` touches or clears the upper band, buy when it
    /// touches or breaks the lower one. Upper wins when the bands coincide.
    pub fn band_signal(&self, index: usize, price: f64) -> Option<CrossSignal> {
        let (u, l) = (self.upper.get(index)?, self.lower.get(index)?);
        if price >= u {
            Some(CrossSignal::Sell)
        } else if price <= l {
            Some(CrossSignal::Buy)
        } else {
            None
        }
    }

    /// `band_signal` for each price, index-aligned with the bands.
    pub fn band_signals(&self, prices: &[f64]) -> Vec<Option<CrossSignal>> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| self.band_signal(i, p))
            .collect()
    }

    /// Percentile rank in (0, 1] of the band width within the trailing
    /// `window` widths. Undefined until `window` widths exist.
    pub fn width_percentile(&self, window: usize) -> IndicatorSeries {
        let widths: Vec<Option<f64>> = (0..self.len()).map(|i| self.width(i)).collect();
        IndicatorSeries::from_values(rolling_percent_rank(&widths, window))
    }
}

/// Calculate Bollinger Bands over `bars`.
pub fn calculate_bollinger(bars: &[Bar], params: &BollingerParams) -> Result<BollingerBands, AnalysisError> {
    params.validate()?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let closes = defined(&closes);
    let middle = IndicatorSeries::from_values(rolling_mean(&closes, params.window));
    let std = IndicatorSeries::from_values(rolling_sample_std(&closes, params.window));

    let k = params.num_std;
    Ok(BollingerBands {
        upper: middle.zip_with(&std, |m, s| m + k * s),
        lower: middle.zip_with(&std, |m, s| m - k * s),
        // The middle band is only reported where the bands exist.
        middle: middle.zip_with(&std, |m, _| m),
    })
}

/// Weekly bands: aggregate the daily series, then apply `daily.weekly()`.
pub fn calculate_weekly_bollinger(
    daily: &BarSeries,
    daily_params: &BollingerParams,
) -> Result<BollingerBands, AnalysisError> {
    let weekly = aggregate_to_weekly(daily);
    calculate_bollinger(weekly.bars(), &daily_params.weekly())
}

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
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&bars(&closes), &BollingerParams::default()).unwrap();
        assert_eq!(bb.middle.first_defined(), Some(19));
        let (u, m, l) = (bb.upper.get(19).unwrap(), bb.middle.get(19).unwrap(), bb.lower.get(19).unwrap());
        assert!((m - 10.5).abs() < 1e-12);
        assert!(u > m && l < m);
        // Sample std of 1..=20 = sqrt(35).
        assert!((u - m - 2.0 * 35f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn bands_are_ordered_where_defined() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bb = calculate_bollinger(&bars(&closes), &BollingerParams::default()).unwrap();
        for i in 0..closes.len() {
            if let (Some(u), Some(m), Some(l)) = (bb.upper.get(i), bb.middle.get(i), bb.lower.get(i)) {
                assert!(l < m && m < u, "index {i}: {l} {m} {u}");
            }
        }
    }

    #[test]
    fn bollinger_flat() {
        let bb = calculate_bollinger(&bars(&[100.0; 20]), &BollingerParams::default()).unwrap();
        assert_eq!(bb.upper.get(19), Some(100.0));
        assert_eq!(bb.lower.get(19), Some(100.0));
        assert_eq!(bb.width(19), Some(0.0));
        assert!(bb.is_squeeze(19, 0.01));
        assert_eq!(bb.percent_b(19, 100.0), None);
    }

    #[test]
    fn band_touches_signal() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bb = calculate_bollinger(&bars(&closes), &BollingerParams::default()).unwrap();
        let (u, m, l) = (bb.upper.get(25).unwrap(), bb.middle.get(25).unwrap(), bb.lower.get(25).unwrap());
        assert_eq!(bb.band_signal(25, u), Some(CrossSignal::Sell));
        assert_eq!(bb.band_signal(25, l - 1.0), Some(CrossSignal::Buy));
        assert_eq!(bb.band_signal(25, m), None);
        assert_eq!(bb.band_signal(5, 0.0), None);

        let signals = bb.band_signals(&closes);
        assert_eq!(signals.len(), closes.len());
        assert!(signals[..19].iter().all(Option::is_none));
    }

    #[test]
    fn width_percentile_tracks_expansion() {
        // Calm then increasingly volatile: each new width is the widest so far.
        let closes: Vec<f64> = (0..40)
            .map(|i| {
                let amp = if i < 20 { 0.5 } else { 0.5 + (i - 19) as f64 };
                100.0 + if i % 2 == 0 { amp } else { -amp }
            })
            .collect();
        let bb = calculate_bollinger(&bars(&closes), &BollingerParams::default()).unwrap();
        let pct = bb.width_percentile(5);
        assert_eq!(pct.len(), 40);
        assert_eq!(pct.first_defined(), Some(23));
        assert_eq!(pct.get(39), Some(1.0));
        for i in 23..40 {
            let p = pct.get(i).unwrap();
            assert!(p > 0.0 && p <= 1.0);
        }
    }

    #[test]
    fn bollinger_insufficient_data() {
        let bb = calculate_bollinger(&bars(&[1.0, 2.0, 3.0]), &BollingerParams::default()).unwrap();
        assert_eq!(bb.len(), 3);
        assert_eq!(bb.middle.defined_count(), 0);
    }

    #[test]
    fn weekly_params_divide_window() {
        let weekly = BollingerParams::default().weekly();
        assert_eq!(weekly.window, 4);
        assert_eq!(weekly.num_std, 2.0);
        assert_eq!(BollingerParams { window: 3, num_std: 2.0 }.weekly().window, 1);
    }

    #[test]
    fn weekly_bands_align_with_weekly_bars() {
        let closes: Vec<f64> = (0..43).map(|i| 50.0 + i as f64).collect();
        let daily = BarSeries::new(bars(&closes));
        let bb = calculate_weekly_bollinger(&daily, &BollingerParams::default()).unwrap();
        assert_eq!(bb.len(), 8);
        assert_eq!(bb.middle.first_defined(), Some(3));
    }

    #[test]
    fn negative_multiplier_rejected() {
        let params = BollingerParams { window: 20, num_std: -1.0 };
        assert!(calculate_bollinger(&bars(&[1.0]), &params).is_err());
    }
}
