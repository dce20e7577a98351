// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free calculators. Each takes a bar slice plus parameters
// and returns a series aligned with its input, with `None` wherever a value
// is not defined. Invalid parameters are rejected up front as configuration
// errors instead of surfacing later as undefined output.
//
// Every calculator has a `calculate_weekly_*` twin that aggregates daily bars
// first and applies the calculator's explicit weekly parameter transform.

pub mod bollinger;
pub mod moving_average;
pub mod series;
pub mod stoch_rsi;
pub mod volatility;
pub mod vwap;

pub use bollinger::{BollingerBands, BollingerParams};
pub use series::IndicatorSeries;
pub use stoch_rsi::{CrossSignal, StochRsi, StochRsiParams};
pub use volatility::{VolatilityMethod, VolatilityParams};
pub use vwap::{VwapBands, VwapMode};
