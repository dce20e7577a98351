// =============================================================================
// trend-signals: Batch Runner
// =============================================================================
//
// Reads `<SYMBOL>.json` bar files for every configured symbol, analyses them
// concurrently and logs each signal. Ctrl+C stops submitting new symbols;
// analyses already running are allowed to finish.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use trend_signals::market_data::{summarize, BarRequest, BarSource, JsonDirSource};
use trend_signals::{analyze_batch, Analyzer, RuntimeConfig, Timeframe};

const DEFAULT_CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("TREND_SIGNALS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    if let Ok(dir) = std::env::var("TREND_SIGNALS_DATA_DIR") {
        config.data_dir = dir;
    }
    if let Ok(syms) = std::env::var("TREND_SIGNALS_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    info!(
        symbols = ?config.symbols,
        data_dir = %config.data_dir,
        exchange = %config.exchange,
        "Configured universe"
    );

    // ── 2. Cancellation on Ctrl+C ────────────────────────────────────────
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received: no further symbols will be submitted");
            cancel_flag.store(true, Ordering::Relaxed);
        }
    });

    // ── 3. Load bars ─────────────────────────────────────────────────────
    let source = JsonDirSource::new(&config.data_dir);
    let mut inputs = Vec::with_capacity(config.symbols.len());
    for symbol in &config.symbols {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let request = BarRequest {
            interval: config.interval.clone(),
            ..BarRequest::daily(&config.exchange, symbol)
        };
        match source.fetch_bars(&request).await {
            Ok(series) => {
                let summary = summarize(&series, Timeframe::Daily);
                info!(
                    symbol = %symbol,
                    bars = summary.total_periods,
                    start = ?summary.start,
                    end = ?summary.end,
                    "Bars loaded"
                );
                inputs.push((symbol.clone(), series));
            }
            Err(e) => error!(symbol = %symbol, error = %e, "Failed to load bars: skipping"),
        }
    }

    // ── 4. Analyse ───────────────────────────────────────────────────────
    let analyzer = Arc::new(Analyzer::new(config.analysis.clone()));
    let report = analyze_batch(analyzer, inputs, config.max_parallel, cancel).await;

    for analysis in &report.succeeded {
        for s in &analysis.signals {
            info!(
                stock = %analysis.stock_name,
                case = %s.case,
                date = %s.timestamp.date_naive(),
                entry = s.entry_price,
                stop = s.stop_loss,
                target = s.target,
                direction = ?s.market_direction,
                strength = ?s.signal_strength,
                "Signal"
            );
        }
    }
    for (name, e) in &report.failed {
        error!(stock = %name, error = %e, "Analysis failed");
    }

    info!(
        analysed = report.succeeded.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        signals = report.total_signals(),
        "Run complete"
    );
    Ok(())
}
