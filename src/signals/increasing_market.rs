// =============================================================================
// Increasing-Market Signal Detector (rule set `increasing-market/v1`)
// =============================================================================
//
// Per-bar classification. Every case shares one precondition, a rising price
// structure at bar i:
//
//   close[i] > MA20[i]  AND  MA10[i] > MA20[i]  AND  MA20[i] > MA20[i - trend_lookback]
//
// Cases (checked in priority order, each may match independently):
//
//   1.a Falling momentum - the last `pullback_bars` closes each fell and
//       close[i] <= MA10[i] * (1 + pullback_ma_tolerance_pct).
//       stop   = lowest low of the last `stop_lookback` bars
//       target = daily upper Bollinger band
//
//   1.b Sideways convergence - |MA10 - MA20| / MA20 <= ma_convergence_pct and
//       |close[i] - close[i - sideways_bars]| / close[i - sideways_bars]
//       <= sideways_range_pct.
//       stop   = daily lower Bollinger band
//       target = entry + reward_risk_ratio * (entry - stop)
//
//   1.c Oscillator divergence - close[i] > close[i - divergence_lookback],
//       %K[i] < %K[i - divergence_lookback], %K crosses above %D at i, and
//       %K[i - 1] <= oversold.
//       stop   = lowest low of the last `stop_lookback` bars
//       target = entry * (1 + volatility_target_multiple * vol[i] / √252)
//
// entry = close[i]. A match survives only if stop < entry < target.
// Any undefined input makes its predicate false, and so does a zero-length
// window. The public entry points reject an invalid config outright.
// Nothing is carried between bars: the same (series, bundle, index, config)
// always yields the same output.
// =============================================================================

use tracing::debug;

use super::signal::{Signal, SignalCase};
use crate::analyzer::IndicatorBundle;
use crate::error::AnalysisError;
use crate::indicators::moving_average::are_close;
use crate::market_data::aggregator::{leading_drop, DAYS_PER_WEEK};
use crate::market_data::{weekly_index_for, Bar, BarSeries};
use crate::runtime_config::{SignalConfig, MIN_WARMUP_FLOOR};
use crate::types::{MarketDirection, Timeframe};

/// Identifier of the predicate and threshold set implemented here.
pub const RULES_VERSION: &str = "increasing-market/v1";

/// Highest-priority signal at `index`, if any.
pub fn detect(
    series: &BarSeries,
    bundle: &IndicatorBundle,
    index: usize,
    config: &SignalConfig,
) -> Result<Option<Signal>, AnalysisError> {
    Ok(detect_cases(series, bundle, index, config)?.into_iter().next())
}

/// Every case that matches at `index`, in priority order.
pub fn detect_cases(
    series: &BarSeries,
    bundle: &IndicatorBundle,
    index: usize,
    config: &SignalConfig,
) -> Result<Vec<Signal>, AnalysisError> {
    config.validate()?;
    Ok(cases_at(series.bars(), bundle, index, config))
}

/// Scan the series from the warm-up floor (or the lookback start, if later)
/// through the last bar.
pub fn detect_trading_signals(
    series: &BarSeries,
    bundle: &IndicatorBundle,
    config: &SignalConfig,
) -> Result<Vec<Signal>, AnalysisError> {
    config.validate()?;

    let n = series.len();
    let mut start = config.warmup_floor.max(MIN_WARMUP_FLOOR);
    if let Some(lookback) = config.lookback {
        start = start.max(n.saturating_sub(lookback));
    }

    let signals: Vec<Signal> = (start..n)
        .flat_map(|index| cases_at(series.bars(), bundle, index, config))
        .collect();

    debug!(bars = n, start, signals = signals.len(), "signal scan finished");
    Ok(signals)
}

/// Matches at `index` under an already validated config.
fn cases_at(bars: &[Bar], bundle: &IndicatorBundle, index: usize, config: &SignalConfig) -> Vec<Signal> {
    let Some(bar) = bars.get(index) else {
        return Vec::new();
    };
    if bundle.len() != bars.len() || !rising_structure(bars, bundle, index, config) {
        return Vec::new();
    }

    let entry = bar.close;
    let market_direction = market_direction(bars, bundle, index, config);
    let signal_strength = signal_strength(bundle, index, config);

    SignalCase::ALL
        .into_iter()
        .filter(|case| case_enabled(*case, config))
        .filter_map(|case| {
            let (stop_loss, target) = match case {
                SignalCase::FallingMomentum => falling_momentum(bars, bundle, index, config),
                SignalCase::SidewaysConvergence => sideways_convergence(bars, bundle, index, config),
                SignalCase::OscillatorDivergence => oscillator_divergence(bars, bundle, index, config),
            }?;

            if !(stop_loss < entry && entry < target) {
                debug!(
                    index,
                    case = %case,
                    entry,
                    stop_loss,
                    target,
                    "case matched but levels are not ordered; dropped"
                );
                return None;
            }

            Some(Signal {
                bar_index: index,
                timestamp: bar.timestamp,
                case,
                entry_price: entry,
                stop_loss,
                target,
                market_direction,
                signal_strength,
            })
        })
        .collect()
}

fn case_enabled(case: SignalCase, config: &SignalConfig) -> bool {
    match case {
        SignalCase::FallingMomentum => config.enable_falling_momentum,
        SignalCase::SidewaysConvergence => config.enable_sideways_convergence,
        SignalCase::OscillatorDivergence => config.enable_oscillator_divergence,
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

fn rising_structure(bars: &[Bar], bundle: &IndicatorBundle, i: usize, cfg: &SignalConfig) -> bool {
    let check = || -> Option<bool> {
        let close = bars[i].close;
        let ma10 = bundle.ma10.get(i)?;
        let ma20 = bundle.ma20.get(i)?;
        let ma20_before = bundle.ma20.get_back(i, cfg.trend_lookback)?;
        Some(close > ma20 && ma10 > ma20 && ma20 > ma20_before)
    };
    check().unwrap_or(false)
}

/// Case 1.a. Returns `(stop, target)` on a match.
fn falling_momentum(bars: &[Bar], bundle: &IndicatorBundle, i: usize, cfg: &SignalConfig) -> Option<(f64, f64)> {
    // An empty pullback window would be vacuously falling.
    if cfg.pullback_bars == 0 {
        return None;
    }
    let first = i.checked_sub(cfg.pullback_bars)?;
    let falling = bars[first..=i].windows(2).all(|w| w[1].close < w[0].close);
    if !falling {
        return None;
    }

    let ma10 = bundle.ma10.get(i)?;
    if bars[i].close > ma10 * (1.0 + cfg.pullback_ma_tolerance_pct) {
        return None;
    }

    let stop = lowest_low(bars, i, cfg.stop_lookback)?;
    let target = bundle.daily_bollinger.upper.get(i)?;
    Some((stop, target))
}

/// Case 1.b.
fn sideways_convergence(
    bars: &[Bar],
    bundle: &IndicatorBundle,
    i: usize,
    cfg: &SignalConfig,
) -> Option<(f64, f64)> {
    if !are_close(&bundle.ma10, &bundle.ma20, i, cfg.ma_convergence_pct) {
        return None;
    }

    if cfg.sideways_bars == 0 {
        return None;
    }
    let earlier = bars[i.checked_sub(cfg.sideways_bars)?].close;
    if earlier == 0.0 {
        return None;
    }
    let entry = bars[i].close;
    if ((entry - earlier) / earlier).abs() > cfg.sideways_range_pct {
        return None;
    }

    let stop = bundle.daily_bollinger.lower.get(i)?;
    let target = entry + cfg.reward_risk_ratio * (entry - stop);
    Some((stop, target))
}

/// Case 1.c.
fn oscillator_divergence(
    bars: &[Bar],
    bundle: &IndicatorBundle,
    i: usize,
    cfg: &SignalConfig,
) -> Option<(f64, f64)> {
    let lag = cfg.divergence_lookback;
    let entry = bars[i].close;
    if entry <= bars[i.checked_sub(lag)?].close {
        return None;
    }

    let stoch = &bundle.daily_stoch_rsi;
    let k = stoch.k.get(i)?;
    let k_before = stoch.k.get_back(i, lag)?;
    let k_prev = stoch.k.get_back(i, 1)?;
    if k >= k_before || !stoch.crossed_above(i) || k_prev > cfg.oversold {
        return None;
    }

    let stop = lowest_low(bars, i, cfg.stop_lookback)?;
    let per_bar_vol = bundle.daily_volatility.get(i)? / Timeframe::Daily.annualization();
    let target = entry * (1.0 + cfg.volatility_target_multiple * per_bar_vol);
    Some((stop, target))
}

/// Lowest low of the `lookback` bars ending at `i`; `None` without a full window.
fn lowest_low(bars: &[Bar], i: usize, lookback: usize) -> Option<f64> {
    let start = (i + 1).checked_sub(lookback)?;
    bars[start..=i].iter().map(|b| b.low).reduce(f64::min)
}

// ---------------------------------------------------------------------------
// Context attached to every signal
// ---------------------------------------------------------------------------

/// Weekly close against the weekly middle band at the last completed week.
fn market_direction(
    bars: &[Bar],
    bundle: &IndicatorBundle,
    i: usize,
    cfg: &SignalConfig,
) -> Option<MarketDirection> {
    let n = bars.len();
    let week = weekly_index_for(i, n)?;
    // The weekly close is the close of the daily bar that ends the week.
    let week_close = bars[leading_drop(n) + week * DAYS_PER_WEEK + DAYS_PER_WEEK - 1].close;
    let middle = bundle.weekly_bollinger.middle.get(week)?;
    if middle == 0.0 {
        return None;
    }

    let rel = (week_close - middle) / middle;
    Some(if rel > cfg.direction_tolerance_pct {
        MarketDirection::Increasing
    } else if rel < -cfg.direction_tolerance_pct {
        MarketDirection::Decreasing
    } else {
        MarketDirection::Sideways
    })
}

/// MA10 / MA20 spread scaled into [0, 1].
fn signal_strength(bundle: &IndicatorBundle, i: usize, cfg: &SignalConfig) -> Option<f64> {
    let ma10 = bundle.ma10.get(i)?;
    let ma20 = bundle.ma20.get(i)?;
    if ma20 == 0.0 {
        return None;
    }
    let spread = (ma10 - ma20) / ma20;
    Some((spread / cfg.strength_full_scale_pct).clamp(0.0, 1.0))
}
