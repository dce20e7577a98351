// =============================================================================
// Error taxonomy
// =============================================================================
//
// Every failure of a single-series analysis maps onto exactly one variant.
// An indicator position that is merely undefined (warm-up, zero denominator)
// is NOT an error and never reaches this type.

use thiserror::Error;

/// Fatal outcome of analysing one bar series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A required field is absent (or non-finite) after ingestion mapping.
    #[error("schema error at bar {index}: missing field `{field}`")]
    Schema { index: usize, field: &'static str },

    /// An OHLC relational invariant or ordering rule is violated.
    #[error("consistency error at bar {index}: {reason}")]
    Consistency { index: usize, reason: String },

    /// The series is too short for the requested computation.
    #[error("insufficient data: {actual} bars, need at least {required}")]
    InsufficientData { actual: usize, required: usize },

    /// An unsupported or out-of-range parameter value.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AnalysisError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
