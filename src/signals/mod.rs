// =============================================================================
// Signals Module
// =============================================================================
//
// Bar-level classification of increasing-market setups:
// - Signal records and case labels (1.a / 1.b / 1.c)
// - The versioned rule set and the full-series scan

pub mod increasing_market;
pub mod signal;

pub use increasing_market::{detect, detect_cases, detect_trading_signals, RULES_VERSION};
pub use signal::{Signal, SignalCase};
