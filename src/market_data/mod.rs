pub mod aggregator;
pub mod bar;
pub mod source;
pub mod validator;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Bar`).
pub use aggregator::{aggregate_to_weekly, summarize, weekly_index_for, weekly_returns, SeriesSummary};
pub use bar::{Bar, BarSeries, RawBar};
pub use source::{BarRequest, BarSource, InMemorySource, JsonDirSource, SourceError};
pub use validator::{ensure_valid, validate, validate_report, ValidationIssue, ValidationReport};
