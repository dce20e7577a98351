// =============================================================================
// Runtime Configuration: indicator parameters and signal thresholds
// =============================================================================
//
// Every tunable number the engine uses lives here so that a run can be
// re-parameterised from a JSON file without a rebuild. That includes the
// signal-case thresholds, which are part of the versioned rule set rather
// than constants in the detector.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnalysisError;
use crate::indicators::{BollingerParams, StochRsiParams, VolatilityParams, VwapMode};

/// Smallest permitted signal warm-up: every 20-bar indicator must be defined.
pub const MIN_WARMUP_FLOOR: usize = 20;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbols() -> Vec<String> {
    vec!["RELIANCE".to_string(), "TCS".to_string(), "INFY".to_string()]
}

fn default_exchange() -> String {
    "NSE".to_string()
}

fn default_interval() -> String {
    "day".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_max_parallel() -> usize {
    4
}

fn default_min_bars() -> usize {
    1
}

fn default_warmup_floor() -> usize {
    MIN_WARMUP_FLOOR
}

fn default_trend_lookback() -> usize {
    5
}

fn default_pullback_bars() -> usize {
    2
}

fn default_pullback_ma_tolerance_pct() -> f64 {
    0.01
}

fn default_stop_lookback() -> usize {
    5
}

fn default_ma_convergence_pct() -> f64 {
    0.02
}

fn default_sideways_bars() -> usize {
    5
}

fn default_sideways_range_pct() -> f64 {
    0.03
}

fn default_reward_risk_ratio() -> f64 {
    2.0
}

fn default_divergence_lookback() -> usize {
    5
}

fn default_oversold() -> f64 {
    20.0
}

fn default_volatility_target_multiple() -> f64 {
    2.0
}

fn default_direction_tolerance_pct() -> f64 {
    0.005
}

fn default_strength_full_scale_pct() -> f64 {
    0.05
}

// =============================================================================
// IndicatorParams
// =============================================================================

/// Parameters for every calculator in the bundle. Weekly parameters are
/// derived from these through each calculator's `weekly()` transform.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default)]
    pub bollinger: BollingerParams,

    #[serde(default)]
    pub stoch_rsi: StochRsiParams,

    #[serde(default)]
    pub volatility: VolatilityParams,

    /// VWAP mode for the daily series.
    #[serde(default)]
    pub daily_vwap: VwapMode,

    /// VWAP mode for the weekly series.
    #[serde(default)]
    pub weekly_vwap: VwapMode,
}

impl IndicatorParams {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.bollinger.validate()?;
        self.stoch_rsi.validate()?;
        self.volatility.validate()?;
        self.daily_vwap.validate()?;
        self.weekly_vwap.validate()
    }
}

// =============================================================================
// SignalConfig
// =============================================================================

/// Thresholds of the increasing-market rule set (see `signals` module).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// First bar index scanned. Never below [`MIN_WARMUP_FLOOR`].
    #[serde(default = "default_warmup_floor")]
    pub warmup_floor: usize,

    /// Only scan the last N bars (still respecting the floor).
    #[serde(default)]
    pub lookback: Option<usize>,

    /// Bars back used to confirm that MA20 is rising.
    #[serde(default = "default_trend_lookback")]
    pub trend_lookback: usize,

    /// Case 1.a: consecutive lower closes that make a pullback.
    #[serde(default = "default_pullback_bars")]
    pub pullback_bars: usize,

    /// Case 1.a: how far above MA10 the close may still sit.
    #[serde(default = "default_pullback_ma_tolerance_pct")]
    pub pullback_ma_tolerance_pct: f64,

    /// Bars searched for the structural-low stop.
    #[serde(default = "default_stop_lookback")]
    pub stop_lookback: usize,

    /// Case 1.b: maximum |MA10 - MA20| / MA20.
    #[serde(default = "default_ma_convergence_pct")]
    pub ma_convergence_pct: f64,

    /// Case 1.b: span of the sideways close check.
    #[serde(default = "default_sideways_bars")]
    pub sideways_bars: usize,

    /// Case 1.b: maximum relative close change over `sideways_bars`.
    #[serde(default = "default_sideways_range_pct")]
    pub sideways_range_pct: f64,

    /// Case 1.b: target distance as a multiple of the stop distance.
    #[serde(default = "default_reward_risk_ratio")]
    pub reward_risk_ratio: f64,

    /// Case 1.c: bars between the two points compared for divergence.
    #[serde(default = "default_divergence_lookback")]
    pub divergence_lookback: usize,

    /// Case 1.c: %K level the crossover must start from (at or below).
    #[serde(default = "default_oversold")]
    pub oversold: f64,

    /// Case 1.c: target distance in per-bar volatility units.
    #[serde(default = "default_volatility_target_multiple")]
    pub volatility_target_multiple: f64,

    /// Weekly close vs weekly middle band tolerance for a SIDEWAYS verdict.
    #[serde(default = "default_direction_tolerance_pct")]
    pub direction_tolerance_pct: f64,

    /// MA10/MA20 spread that maps to full signal strength.
    #[serde(default = "default_strength_full_scale_pct")]
    pub strength_full_scale_pct: f64,

    #[serde(default = "default_true")]
    pub enable_falling_momentum: bool,

    #[serde(default = "default_true")]
    pub enable_sideways_convergence: bool,

    #[serde(default = "default_true")]
    pub enable_oscillator_divergence: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            warmup_floor: default_warmup_floor(),
            lookback: None,
            trend_lookback: default_trend_lookback(),
            pullback_bars: default_pullback_bars(),
            pullback_ma_tolerance_pct: default_pullback_ma_tolerance_pct(),
            stop_lookback: default_stop_lookback(),
            ma_convergence_pct: default_ma_convergence_pct(),
            sideways_bars: default_sideways_bars(),
            sideways_range_pct: default_sideways_range_pct(),
            reward_risk_ratio: default_reward_risk_ratio(),
            divergence_lookback: default_divergence_lookback(),
            oversold: default_oversold(),
            volatility_target_multiple: default_volatility_target_multiple(),
            direction_tolerance_pct: default_direction_tolerance_pct(),
            strength_full_scale_pct: default_strength_full_scale_pct(),
            enable_falling_momentum: true,
            enable_sideways_convergence: true,
            enable_oscillator_divergence: true,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.warmup_floor < MIN_WARMUP_FLOOR {
            return Err(AnalysisError::config(format!(
                "warmup_floor must be >= {MIN_WARMUP_FLOOR}, got {}",
                self.warmup_floor
            )));
        }
        let spans = [
            ("trend_lookback", self.trend_lookback),
            ("pullback_bars", self.pullback_bars),
            ("stop_lookback", self.stop_lookback),
            ("sideways_bars", self.sideways_bars),
            ("divergence_lookback", self.divergence_lookback),
        ];
        for (name, value) in spans {
            if value == 0 {
                return Err(AnalysisError::config(format!("{name} must be >= 1")));
            }
        }
        let ratios = [
            ("pullback_ma_tolerance_pct", self.pullback_ma_tolerance_pct),
            ("ma_convergence_pct", self.ma_convergence_pct),
            ("sideways_range_pct", self.sideways_range_pct),
            ("reward_risk_ratio", self.reward_risk_ratio),
            ("oversold", self.oversold),
            ("volatility_target_multiple", self.volatility_target_multiple),
            ("direction_tolerance_pct", self.direction_tolerance_pct),
        ];
        for (name, value) in ratios {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalysisError::config(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        if !(self.strength_full_scale_pct.is_finite() && self.strength_full_scale_pct > 0.0) {
            return Err(AnalysisError::config("strength_full_scale_pct must be > 0"));
        }
        Ok(())
    }
}

// =============================================================================
// AnalysisConfig
// =============================================================================

/// Everything one `analyze()` call needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Series shorter than this are rejected as insufficient data.
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    #[serde(default)]
    pub indicators: IndicatorParams,

    #[serde(default)]
    pub signals: SignalConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_bars: default_min_bars(),
            indicators: IndicatorParams::default(),
            signals: SignalConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.indicators.validate()?;
        self.signals.validate()
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the batch runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Symbols analysed on each run.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Exchange passed to the bar source.
    #[serde(default = "default_exchange")]
    pub exchange: String,

    /// Interval label passed to the bar source.
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Directory holding `<SYMBOL>.json` bar files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Upper bound on concurrently running analyses.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            exchange: default_exchange(),
            interval: default_interval(),
            data_dir: default_data_dir(),
            max_parallel: default_max_parallel(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config
            .analysis
            .validate()
            .with_context(|| format!("invalid analysis settings in {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            exchange = %config.exchange,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}
