// =============================================================================
// Timeframe Aggregator: daily bars to weekly bars
// =============================================================================
//
// A week is exactly five consecutive daily bars:
//   open   = first bar's open
//   close  = last bar's close
//   high   = max(high)
//   low    = min(low)
//   volume = sum(volume)
//   timestamp = last bar's timestamp
//
// The first `n % 5` (oldest) bars are discarded so that the most recent bar
// always closes a complete week. Partial groups never produce output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::bar::{Bar, BarSeries};
use crate::types::Timeframe;

/// Bars per weekly group.
pub const DAYS_PER_WEEK: usize = 5;

/// Number of leading daily bars dropped for a series of length `n`.
pub fn leading_drop(n: usize) -> usize {
    n % DAYS_PER_WEEK
}

/// Reduce a daily series to complete weekly bars, oldest first.
pub fn aggregate_to_weekly(daily: &BarSeries) -> BarSeries {
    let drop = leading_drop(daily.len());
    if drop > 0 {
        debug!(dropped = drop, total = daily.len(), "ignored leading days to complete weeks");
    }

    let weekly: Vec<Bar> = daily.bars()[drop..]
        .chunks_exact(DAYS_PER_WEEK)
        .map(aggregate_week)
        .collect();

    BarSeries::new(weekly)
}

fn aggregate_week(week: &[Bar]) -> Bar {
    let first = &week[0];
    let last = &week[week.len() - 1];
    Bar {
        timestamp: last.timestamp,
        open: first.open,
        high: week.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        low: week.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        close: last.close,
        volume: week.iter().map(|b| b.volume).sum(),
    }
}

/// Index of the most recent weekly bar that is complete at `daily_index`.
///
/// Weekly bar `k` closes on daily index `drop + 5k + 4`, so this never looks
/// ahead of the daily bar. Returns `None` before the first complete week or
/// when `daily_index` is outside the series.
pub fn weekly_index_for(daily_index: usize, n_daily: usize) -> Option<usize> {
    if daily_index >= n_daily {
        return None;
    }
    let first_close = leading_drop(n_daily) + DAYS_PER_WEEK - 1;
    if daily_index < first_close {
        return None;
    }
    Some((daily_index - first_close) / DAYS_PER_WEEK)
}

/// Close-to-close simple returns; element `i` is the return into bar `i + 1`.
pub fn weekly_returns(weekly: &BarSeries) -> Vec<Option<f64>> {
    weekly
        .bars()
        .windows(2)
        .map(|w| {
            if w[0].close == 0.0 {
                None
            } else {
                Some(w[1].close / w[0].close - 1.0)
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

/// Descriptive statistics for a bar series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    pub timeframe: Timeframe,
    pub total_periods: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub min_close: Option<f64>,
    pub max_close: Option<f64>,
    pub avg_close: Option<f64>,
    pub total_volume: f64,
    pub avg_volume: Option<f64>,
    pub max_volume: Option<f64>,
}

pub fn summarize(series: &BarSeries, timeframe: Timeframe) -> SeriesSummary {
    let n = series.len();
    let closes = series.iter().map(|b| b.close);
    let volumes = series.iter().map(|b| b.volume);
    let total_volume: f64 = volumes.clone().sum();

    SeriesSummary {
        timeframe,
        total_periods: n,
        start: series.bars().first().map(|b| b.timestamp),
        end: series.last().map(|b| b.timestamp),
        min_close: closes.clone().reduce(f64::min),
        max_close: closes.clone().reduce(f64::max),
        avg_close: (n > 0).then(|| closes.sum::<f64>() / n as f64),
        total_volume,
        avg_volume: (n > 0).then(|| total_volume / n as f64),
        max_volume: volumes.reduce(f64::max),
    }
}
