// =============================================================================
// Indicator Series and rolling-window primitives
// =============================================================================
//
// An indicator series is aligned index-for-index with the bars it was
// computed from. Positions without a value (warm-up, degenerate denominator,
// undefined input) hold `None`; a stored value is always finite.
//
// Rolling statistics follow one rule: the output at `i` is defined only when
// all `window` inputs ending at `i` are defined. Undefined inputs therefore
// propagate forward instead of being coerced to zero.

use serde::{Deserialize, Serialize};

/// A numeric series with explicit undefined positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorSeries {
    values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    /// Build from raw values; any non-finite `Some` becomes `None`.
    pub fn from_values(values: Vec<Option<f64>>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect(),
        }
    }

    /// A series of `len` undefined positions.
    pub fn undefined(len: usize) -> Self {
        Self {
            values: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`; `None` when undefined or out of range.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    /// Value `lag` positions before `index`.
    pub fn get_back(&self, index: usize, lag: usize) -> Option<f64> {
        index.checked_sub(lag).and_then(|i| self.get(i))
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    /// Index of the first defined position.
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(Option::is_some)
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Element-wise combination; undefined if either side is undefined.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self::from_values(
            self.values
                .iter()
                .zip(other.values.iter())
                .map(|(a, b)| Some(f((*a)?, (*b)?)))
                .collect(),
        )
    }
}

impl From<Vec<Option<f64>>> for IndicatorSeries {
    fn from(values: Vec<Option<f64>>) -> Self {
        Self::from_values(values)
    }
}

// =============================================================================
// Rolling helpers
// =============================================================================

/// Apply `f` to every complete, fully-defined window ending at each index.
pub(crate) fn rolling<F>(input: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = Vec::with_capacity(input.len());
    let mut buf: Vec<f64> = Vec::with_capacity(window);

    for i in 0..input.len() {
        if window == 0 || i + 1 < window {
            out.push(None);
            continue;
        }
        buf.clear();
        let mut complete = true;
        for v in &input[i + 1 - window..=i] {
            match v {
                Some(x) => buf.push(*x),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        out.push(if complete { f(&buf).filter(|x| x.is_finite()) } else { None });
    }

    out
}

pub(crate) fn rolling_mean(input: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(input, window, mean)
}

pub(crate) fn rolling_sum(input: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(input, window, |w| Some(w.iter().sum()))
}

pub(crate) fn rolling_sample_std(input: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(input, window, sample_std)
}

pub(crate) fn rolling_min(input: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(input, window, |w| w.iter().copied().reduce(f64::min))
}

pub(crate) fn rolling_max(input: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(input, window, |w| w.iter().copied().reduce(f64::max))
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator); undefined below 2 points.
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Percentile rank of the last value within `values`, in (0, 1].
/// Ties share the average of their ranks.
pub(crate) fn percent_rank_of_last(values: &[f64]) -> Option<f64> {
    let last = *values.last()?;
    let below = values.iter().filter(|&&v| v < last).count() as f64;
    let equal = values.iter().filter(|&&v| v == last).count() as f64;
    Some((below + (equal + 1.0) / 2.0) / values.len() as f64)
}

pub(crate) fn rolling_percent_rank(input: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(input, window, percent_rank_of_last)
}

/// Lift a plain slice into the optional representation.
pub(crate) fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|&v| Some(v)).collect()
}
