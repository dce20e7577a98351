// =============================================================================
// trend-signals: indicator bundle and increasing-market signal engine
// =============================================================================
//
// Daily bars in, one `Analysis` out: validated series, weekly aggregate,
// indicator bundle (moving averages, Bollinger Bands, Stochastic RSI,
// volatility, VWAP on both timeframes) and the ordered list of signals.
// =============================================================================

pub mod analyzer;
pub mod batch;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod runtime_config;
pub mod signals;
pub mod types;

pub use analyzer::{build_bundle, Analysis, Analyzer, IndicatorBundle};
pub use batch::{analyze_all, analyze_batch, BatchError, BatchReport};
pub use error::AnalysisError;
pub use market_data::{aggregate_to_weekly, validate, Bar, BarSeries, RawBar};
pub use runtime_config::{AnalysisConfig, IndicatorParams, RuntimeConfig, SignalConfig};
pub use signals::{detect, detect_cases, detect_trading_signals, Signal, SignalCase, RULES_VERSION};
pub use types::{MarketDirection, Timeframe};
