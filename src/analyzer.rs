// =============================================================================
// Analyzer: validate, aggregate, compute the indicator bundle, detect
// =============================================================================
//
// Pipeline for one bar series:
//
//   validate ─► aggregate to weekly (once) ─► every calculator ─► bundle
//                                                                  │
//                                       detect_trading_signals ◄───┘
//
// Validation failures are raised before any indicator is computed. The
// bundle is an explicit value: detection reads only what it is handed.
//
// The analyzer keeps a snapshot of its most recent result for callers that
// poll (e.g. a status endpoint); concurrent `analyze` calls never share
// anything else.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::indicators::bollinger::calculate_bollinger;
use crate::indicators::moving_average::calculate_sma;
use crate::indicators::stoch_rsi::calculate_stoch_rsi;
use crate::indicators::volatility::calculate_volatility;
use crate::indicators::vwap::calculate_vwap;
use crate::indicators::{BollingerBands, IndicatorSeries, StochRsi};
use crate::market_data::{aggregate_to_weekly, ensure_valid, BarSeries};
use crate::runtime_config::{AnalysisConfig, IndicatorParams};
use crate::signals::{detect_trading_signals, Signal, RULES_VERSION};
use crate::types::Timeframe;

/// Fast moving-average window.
pub const MA_FAST: usize = 10;
/// Slow moving-average window.
pub const MA_SLOW: usize = 20;

// =============================================================================
// IndicatorBundle
// =============================================================================

/// Every indicator computed for one series.
///
/// Daily series align with the input bars; weekly series align with the
/// aggregated weekly bars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBundle {
    pub ma10: IndicatorSeries,
    pub ma20: IndicatorSeries,
    pub daily_volatility: IndicatorSeries,
    pub weekly_volatility: IndicatorSeries,
    pub daily_stoch_rsi: StochRsi,
    pub weekly_stoch_rsi: StochRsi,
    pub daily_bollinger: BollingerBands,
    pub weekly_bollinger: BollingerBands,
    pub daily_vwap: IndicatorSeries,
    pub weekly_vwap: IndicatorSeries,
}

impl IndicatorBundle {
    /// Number of daily positions covered.
    pub fn len(&self) -> usize {
        self.ma20.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ma20.is_empty()
    }

    /// Number of weekly positions covered.
    pub fn weekly_len(&self) -> usize {
        self.weekly_bollinger.len()
    }
}

/// Compute the full bundle for `series` with the given parameters.
pub fn build_bundle(series: &BarSeries, params: &IndicatorParams) -> Result<IndicatorBundle, AnalysisError> {
    let weekly = aggregate_to_weekly(series);
    bundle_from(series, &weekly, params)
}

fn bundle_from(
    daily: &BarSeries,
    weekly: &BarSeries,
    params: &IndicatorParams,
) -> Result<IndicatorBundle, AnalysisError> {
    params.validate()?;

    let d = daily.bars();
    let w = weekly.bars();

    Ok(IndicatorBundle {
        ma10: calculate_sma(d, MA_FAST)?,
        ma20: calculate_sma(d, MA_SLOW)?,
        daily_volatility: calculate_volatility(d, &params.volatility, Timeframe::Daily)?,
        weekly_volatility: calculate_volatility(w, &params.volatility.weekly(), Timeframe::Weekly)?,
        daily_stoch_rsi: calculate_stoch_rsi(d, &params.stoch_rsi)?,
        weekly_stoch_rsi: calculate_stoch_rsi(w, &params.stoch_rsi.weekly())?,
        daily_bollinger: calculate_bollinger(d, &params.bollinger)?,
        weekly_bollinger: calculate_bollinger(w, &params.bollinger.weekly())?,
        daily_vwap: calculate_vwap(d, params.daily_vwap)?,
        weekly_vwap: calculate_vwap(w, params.weekly_vwap)?,
    })
}

// =============================================================================
// Analysis
// =============================================================================

/// Result of analysing one stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub stock_name: String,
    pub analyzed_at: DateTime<Utc>,
    pub rules_version: String,
    pub bars: BarSeries,
    pub weekly_bars: BarSeries,
    pub bundle: IndicatorBundle,
    /// Ascending by `bar_index`, then by case.
    pub signals: Vec<Signal>,
}

// =============================================================================
// Analyzer
// =============================================================================

pub struct Analyzer {
    config: AnalysisConfig,
    last: RwLock<Option<Arc<Analysis>>>,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            last: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse one series end to end.
    ///
    /// Fails without computing anything when the series is empty or shorter
    /// than `min_bars`, when it violates a bar invariant, or when the
    /// configuration is out of range.
    pub fn analyze(&self, stock_name: &str, series: BarSeries) -> Result<Arc<Analysis>, AnalysisError> {
        let required = self.config.min_bars.max(1);
        if series.len() < required {
            return Err(AnalysisError::InsufficientData {
                actual: series.len(),
                required,
            });
        }
        ensure_valid(&series)?;
        self.config.validate()?;

        let weekly = aggregate_to_weekly(&series);
        let bundle = bundle_from(&series, &weekly, &self.config.indicators)?;
        debug!(
            stock = stock_name,
            daily = series.len(),
            weekly = weekly.len(),
            "indicator bundle computed"
        );

        let signals = detect_trading_signals(&series, &bundle, &self.config.signals)?;

        info!(
            stock = stock_name,
            bars = series.len(),
            weekly_bars = weekly.len(),
            signals = signals.len(),
            rules = RULES_VERSION,
            "analysis complete"
        );

        let analysis = Arc::new(Analysis {
            id: Uuid::new_v4(),
            stock_name: stock_name.to_string(),
            analyzed_at: Utc::now(),
            rules_version: RULES_VERSION.to_string(),
            bars: series,
            weekly_bars: weekly,
            bundle,
            signals,
        });

        *self.last.write() = Some(Arc::clone(&analysis));
        Ok(analysis)
    }

    /// The most recent successful analysis, if any.
    pub fn last_analysis(&self) -> Option<Arc<Analysis>> {
        self.last.read().clone()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::VwapMode;
    use crate::market_data::Bar;
    use chrono::TimeZone;

    fn series(n: usize) -> BarSeries {
        BarSeries::new(
            (0..n)
                .map(|i| {
                    let c = 100.0 + i as f64 * 0.5 + (i as f64 * 0.7).sin() * 2.0;
                    Bar {
                        timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0).unwrap(),
                        open: c - 0.2,
                        high: c + 1.0,
                        low: c - 1.0,
                        close: c,
                        volume: 1_000.0 + (i % 4) as f64 * 50.0,
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn bundle_lengths_match_timeframes() {
        let s = series(63);
        let bundle = build_bundle(&s, &IndicatorParams::default()).unwrap();
        assert_eq!(bundle.len(), 63);
        assert_eq!(bundle.ma10.len(), 63);
        assert_eq!(bundle.daily_vwap.len(), 63);
        assert_eq!(bundle.daily_stoch_rsi.len(), 63);
        assert_eq!(bundle.weekly_len(), 12);
        assert_eq!(bundle.weekly_vwap.len(), 12);
        assert_eq!(bundle.weekly_volatility.len(), 12);
        assert_eq!(bundle.weekly_stoch_rsi.len(), 12);
    }

    #[test]
    fn bundle_warm_up_positions() {
        let bundle = build_bundle(&series(40), &IndicatorParams::default()).unwrap();
        assert_eq!(bundle.ma10.first_defined(), Some(9));
        assert_eq!(bundle.ma20.first_defined(), Some(19));
        assert_eq!(bundle.daily_bollinger.middle.first_defined(), Some(19));
        assert_eq!(bundle.daily_vwap.first_defined(), Some(0));
        // Weekly bands use a window of 4 weekly bars.
        assert_eq!(bundle.weekly_bollinger.middle.first_defined(), Some(3));
    }

    #[test]
    fn rolling_vwap_mode_is_respected() {
        let params = IndicatorParams {
            daily_vwap: VwapMode::Rolling(5),
            ..IndicatorParams::default()
        };
        let bundle = build_bundle(&series(30), &params).unwrap();
        assert_eq!(bundle.daily_vwap.first_defined(), Some(4));
        assert_eq!(bundle.weekly_vwap.first_defined(), Some(0));
    }

    #[test]
    fn empty_series_is_insufficient() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let err = analyzer.analyze("EMPTY", BarSeries::default()).unwrap_err();
        assert_eq!(err, AnalysisError::InsufficientData { actual: 0, required: 1 });
        assert!(analyzer.last_analysis().is_none());
    }

    #[test]
    fn min_bars_is_enforced() {
        let config = AnalysisConfig { min_bars: 20, ..AnalysisConfig::default() };
        let analyzer = Analyzer::new(config);
        assert!(matches!(
            analyzer.analyze("SHORT", series(12)),
            Err(AnalysisError::InsufficientData { actual: 12, required: 20 })
        ));
    }

    #[test]
    fn invalid_bar_fails_before_indicators() {
        let mut bars = series(30).bars().to_vec();
        bars[7].high = bars[7].low - 1.0;
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let err = analyzer.analyze("BAD", BarSeries::new(bars)).unwrap_err();
        assert!(matches!(err, AnalysisError::Consistency { index: 7, .. }));
    }

    #[test]
    fn bad_parameters_are_configuration_errors() {
        let mut config = AnalysisConfig::default();
        config.indicators.bollinger.window = 0;
        let analyzer = Analyzer::new(config);
        assert!(matches!(
            analyzer.analyze("CFG", series(30)),
            Err(AnalysisError::Configuration(_))
        ));
    }

    #[test]
    fn second_analysis_replaces_snapshot() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let first = analyzer.analyze("AAA", series(30)).unwrap();
        assert_eq!(analyzer.last_analysis().unwrap().id, first.id);

        let second = analyzer.analyze("BBB", series(45)).unwrap();
        let last = analyzer.last_analysis().unwrap();
        assert_eq!(last.id, second.id);
        assert_eq!(last.stock_name, "BBB");
        assert_eq!(last.weekly_bars.len(), 9);
        assert_eq!(last.rules_version, RULES_VERSION);
    }
}
