// =============================================================================
// Bars and Bar Series
// =============================================================================
//
// `Bar` is one canonical OHLCV record. `RawBar` is the same record as it
// arrives from outside, with every field optional until the schema check in
// `into_bar` passes. `BarSeries` keeps bars sorted by timestamp with
// duplicates removed.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar in canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Typical price `(H + L + C) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// A bar as handed over by an ingestion collaborator, before the schema check.
///
/// Column names are already mapped to the canonical set; a field that could
/// not be mapped arrives as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl RawBar {
    /// Convert into a canonical [`Bar`], reporting the first missing field.
    ///
    /// `index` is the record's position in its source and only feeds the error.
    pub fn into_bar(self, index: usize) -> Result<Bar, AnalysisError> {
        let missing = |field| AnalysisError::Schema { index, field };
        Ok(Bar {
            timestamp: self.timestamp.ok_or_else(|| missing("timestamp"))?,
            open: self.open.ok_or_else(|| missing("open"))?,
            high: self.high.ok_or_else(|| missing("high"))?,
            low: self.low.ok_or_else(|| missing("low"))?,
            close: self.close.ok_or_else(|| missing("close"))?,
            volume: self.volume.ok_or_else(|| missing("volume"))?,
        })
    }
}

// ---------------------------------------------------------------------------
// BarSeries
// ---------------------------------------------------------------------------

/// Ordered sequence of bars for one instrument.
///
/// Construction does not enforce the ordering invariant; run the validator
/// before analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars }
    }

    /// Sort by timestamp and drop duplicate timestamps, keeping the last
    /// occurrence in input order.
    pub fn from_unsorted(mut bars: Vec<Bar>) -> Self {
        // Stable sort keeps input order among equal timestamps, so the last
        // element of each run is the last occurrence.
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self { bars: deduped }
    }

    /// Schema-check raw records, then sort and deduplicate.
    pub fn from_raw(raw: Vec<RawBar>) -> Result<Self, AnalysisError> {
        let bars = raw
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.into_bar(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_unsorted(bars))
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// A new series holding the first `len` bars.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            bars: self.bars[..len.min(self.bars.len())].to_vec(),
        }
    }
}

impl From<Vec<Bar>> for BarSeries {
    fn from(bars: Vec<Bar>) -> Self {
        Self::new(bars)
    }
}

impl<'a> IntoIterator for &'a BarSeries {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(day: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000 + day * 86_400, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn from_unsorted_keeps_last_duplicate() {
        let series = BarSeries::from_unsorted(vec![bar(2, 12.0), bar(1, 10.0), bar(2, 13.0), bar(0, 9.0)]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![9.0, 10.0, 13.0]);
    }

    #[test]
    fn raw_bar_missing_field_is_schema_error() {
        let raw = RawBar {
            timestamp: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            open: Some(1.0),
            high: Some(2.0),
            low: Some(0.5),
            close: None,
            volume: Some(10.0),
        };
        let err = raw.into_bar(4).unwrap_err();
        assert_eq!(err, AnalysisError::Schema { index: 4, field: "close" });
    }

    #[test]
    fn raw_json_without_volume_fails() {
        let json = r#"[{"timestamp":"2024-01-02T00:00:00Z","open":1.0,"high":2.0,"low":0.5,"close":1.5}]"#;
        let raw: Vec<RawBar> = serde_json::from_str(json).unwrap();
        assert!(matches!(
            BarSeries::from_raw(raw),
            Err(AnalysisError::Schema { field: "volume", .. })
        ));
    }

    #[test]
    fn typical_price() {
        let b = bar(0, 10.0);
        assert!((b.typical_price() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn prefix_is_clamped() {
        let series = BarSeries::new(vec![bar(0, 1.0), bar(1, 2.0)]);
        assert_eq!(series.prefix(1).len(), 1);
        assert_eq!(series.prefix(10).len(), 2);
    }
}
