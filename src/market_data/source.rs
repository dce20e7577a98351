// =============================================================================
// Bar Sources
// =============================================================================
//
// The analysis core never talks to a broker or reads spreadsheets itself. A
// `BarSource` hands it a canonical `BarSeries`; anything that goes wrong on
// the way (authentication, throttling, empty result) surfaces as a
// `SourceError` before the core is involved.
//
// Adapters: `InMemorySource` for tests and demos, and `JsonDirSource`, which
// reads pre-normalised `<SYMBOL>.json` files.
// =============================================================================

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::bar::{BarSeries, RawBar};
use crate::error::AnalysisError;

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRequest {
    pub exchange: String,
    pub symbol: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Vendor interval label, e.g. `"day"`.
    pub interval: String,
}

impl BarRequest {
    pub fn daily(exchange: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            start: None,
            end: None,
            interval: "day".to_string(),
        }
    }

    fn in_range(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

/// Errors raised by a [`BarSource`] implementation.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials missing, expired, or rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The upstream throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request succeeded but produced no bars.
    #[error("no data for {exchange}:{symbol}")]
    NoData { exchange: String, symbol: String },

    /// Transport, file, or decoding failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The upstream returned records that fail the canonical schema.
    #[error("malformed bars: {0}")]
    Malformed(#[from] AnalysisError),
}

#[async_trait]
pub trait BarSource: Send + Sync {
    async fn fetch_bars(&self, request: &BarRequest) -> Result<BarSeries, SourceError>;
}

// ---------------------------------------------------------------------------
// InMemorySource
// ---------------------------------------------------------------------------

/// Serves fixed series keyed by symbol.
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    series: HashMap<String, BarSeries>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, series: BarSeries) {
        self.series.insert(symbol.into(), series);
    }
}

#[async_trait]
impl BarSource for InMemorySource {
    async fn fetch_bars(&self, request: &BarRequest) -> Result<BarSeries, SourceError> {
        let series = self
            .series
            .get(&request.symbol)
            .ok_or_else(|| no_data(request))?;
        let bars: Vec<_> = series
            .iter()
            .filter(|b| request.in_range(b.timestamp))
            .copied()
            .collect();
        if bars.is_empty() {
            return Err(no_data(request));
        }
        Ok(BarSeries::new(bars))
    }
}

// ---------------------------------------------------------------------------
// JsonDirSource
// ---------------------------------------------------------------------------

/// Reads `<dir>/<SYMBOL>.json`, a JSON array of canonical [`RawBar`] records.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.json"))
    }
}

#[async_trait]
impl BarSource for JsonDirSource {
    async fn fetch_bars(&self, request: &BarRequest) -> Result<BarSeries, SourceError> {
        let path = self.path_for(&request.symbol);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(no_data(request)),
            Err(e) => return Err(SourceError::Request(format!("{}: {e}", path.display()))),
        };
        let raw: Vec<RawBar> = serde_json::from_str(&content)
            .map_err(|e| SourceError::Request(format!("{}: {e}", path.display())))?;

        let series = BarSeries::from_raw(raw)?;
        let bars: Vec<_> = series
            .iter()
            .filter(|b| request.in_range(b.timestamp))
            .copied()
            .collect();

        debug!(path = %path.display(), bars = bars.len(), "loaded bar file");

        if bars.is_empty() {
            return Err(no_data(request));
        }
        Ok(BarSeries::new(bars))
    }
}

fn no_data(request: &BarRequest) -> SourceError {
    SourceError::NoData {
        exchange: request.exchange.clone(),
        symbol: request.symbol.clone(),
    }
}
