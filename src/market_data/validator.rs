// =============================================================================
// Bar Series Validator
// =============================================================================
//
// Precondition gate in front of every indicator computation. Produces a list
// of diagnostics instead of failing on the first problem, so callers can log
// every offending bar; `ensure_valid` turns the first one into an error.
//
// Rules per bar:
//   - every field finite (a NaN means the value was missing upstream)
//   - open, high, low, close >= 0 and volume >= 0
//   - high >= low, high >= open, high >= close, low <= open, low <= close
// Rules across bars:
//   - timestamps strictly increasing (no duplicates)
//
// Inconsistent bars are reported, never clamped.

use serde::Serialize;
use tracing::debug;

use super::bar::{Bar, BarSeries};
use crate::error::AnalysisError;

/// What is wrong with a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    MissingField(&'static str),
    NegativePrice,
    NegativeVolume,
    HighBelowLow,
    HighBelowOpen,
    HighBelowClose,
    LowAboveOpen,
    LowAboveClose,
    NonIncreasingTimestamp,
}

impl IssueKind {
    fn describe(self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing field",
            Self::NegativePrice => "negative price",
            Self::NegativeVolume => "negative volume",
            Self::HighBelowLow => "high < low",
            Self::HighBelowOpen => "high < open",
            Self::HighBelowClose => "high < close",
            Self::LowAboveOpen => "low > open",
            Self::LowAboveClose => "low > close",
            Self::NonIncreasingTimestamp => "timestamp not strictly increasing",
        }
    }
}

/// One violated rule at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub index: usize,
    pub kind: IssueKind,
}

impl ValidationIssue {
    fn into_error(self) -> AnalysisError {
        match self.kind {
            IssueKind::MissingField(field) => AnalysisError::Schema {
                index: self.index,
                field,
            },
            kind => AnalysisError::Consistency {
                index: self.index,
                reason: kind.describe().to_string(),
            },
        }
    }
}

/// Every issue found in a series, in bar order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// `true` iff every per-bar and cross-bar rule holds.
pub fn validate(series: &BarSeries) -> bool {
    validate_report(series).is_valid()
}

/// Check the series and collect every violated rule.
pub fn validate_report(series: &BarSeries) -> ValidationReport {
    let mut issues = Vec::new();

    for (index, bar) in series.iter().enumerate() {
        check_bar(index, bar, &mut issues);

        if index > 0 && bar.timestamp <= series.bars()[index - 1].timestamp {
            issues.push(ValidationIssue {
                index,
                kind: IssueKind::NonIncreasingTimestamp,
            });
        }
    }

    for issue in &issues {
        debug!(index = issue.index, issue = issue.kind.describe(), "bar failed validation");
    }

    ValidationReport { issues }
}

/// Fail with the first issue, mapped onto the error taxonomy.
pub fn ensure_valid(series: &BarSeries) -> Result<(), AnalysisError> {
    match validate_report(series).issues.into_iter().next() {
        Some(issue) => Err(issue.into_error()),
        None => Ok(()),
    }
}

fn check_bar(index: usize, bar: &Bar, issues: &mut Vec<ValidationIssue>) {
    let mut push = |kind| issues.push(ValidationIssue { index, kind });

    let fields = [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
        ("volume", bar.volume),
    ];
    let mut missing = false;
    for (name, value) in fields {
        if !value.is_finite() {
            push(IssueKind::MissingField(name));
            missing = true;
        }
    }
    // Relational checks on NaN would be meaningless.
    if missing {
        return;
    }

    if bar.open < 0.0 || bar.high < 0.0 || bar.low < 0.0 || bar.close < 0.0 {
        push(IssueKind::NegativePrice);
    }
    if bar.volume < 0.0 {
        push(IssueKind::NegativeVolume);
    }
    if bar.high < bar.low {
        push(IssueKind::HighBelowLow);
    }
    if bar.high < bar.open {
        push(IssueKind::HighBelowOpen);
    }
    if bar.high < bar.close {
        push(IssueKind::HighBelowClose);
    }
    if bar.low > bar.open {
        push(IssueKind::LowAboveOpen);
    }
    if bar.low > bar.close {
        push(IssueKind::LowAboveClose);
    }
}
