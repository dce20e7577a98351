// =============================================================================
// Batch orchestration: many stocks, one analyzer
// =============================================================================
//
// Each series is analysed on the blocking pool (the work is pure CPU) with
// at most `max_parallel` analyses in flight. One stock's failure is recorded
// and never aborts the others.
//
// Cancellation is cooperative: once the flag is set no further series is
// submitted, but analyses already running finish and are reported.
//
// Every input ends up in exactly one of succeeded, failed or skipped.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::analyzer::{Analysis, Analyzer};
use crate::error::AnalysisError;
use crate::market_data::BarSeries;

/// Why one stock in a batch produced no analysis.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// The worker task panicked or was aborted.
    #[error("analysis task failed: {0}")]
    Task(String),
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Completed analyses, in completion order.
    pub succeeded: Vec<Arc<Analysis>>,
    pub failed: Vec<(String, BatchError)>,
    /// Names never submitted because the batch was cancelled.
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn total_signals(&self) -> usize {
        self.succeeded.iter().map(|a| a.signals.len()).sum()
    }
}

/// Analyse every `(name, series)` pair concurrently.
pub async fn analyze_batch(
    analyzer: Arc<Analyzer>,
    inputs: Vec<(String, BarSeries)>,
    max_parallel: usize,
    cancel: Arc<AtomicBool>,
) -> BatchReport {
    let permits = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut tasks = JoinSet::new();
    let mut report = BatchReport::default();

    let mut in_flight: Vec<String> = Vec::new();
    let mut pending = inputs.into_iter();
    while let Some((name, series)) = pending.next() {
        if cancel.load(Ordering::Relaxed) {
            report.skipped.push(name);
            report.skipped.extend(pending.by_ref().map(|(n, _)| n));
            break;
        }

        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            report.skipped.push(name);
            continue;
        };
        let analyzer = Arc::clone(&analyzer);
        in_flight.push(name.clone());
        tasks.spawn(async move {
            let _permit = permit;
            let task_name = name.clone();
            let result = tokio::task::spawn_blocking(move || analyzer.analyze(&task_name, series)).await;
            (name, result)
        });
    }

    if !report.skipped.is_empty() {
        warn!(skipped = report.skipped.len(), "batch cancelled; remaining stocks not submitted");
    }

    let mut worker_errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let name = match joined {
            Ok((name, Ok(Ok(analysis)))) => {
                report.succeeded.push(analysis);
                name
            }
            Ok((name, Ok(Err(e)))) => {
                warn!(stock = %name, error = %e, "analysis failed");
                report.failed.push((name.clone(), BatchError::Analysis(e)));
                name
            }
            Ok((name, Err(e))) => {
                warn!(stock = %name, error = %e, "analysis task failed");
                report.failed.push((name.clone(), BatchError::Task(e.to_string())));
                name
            }
            // The name went down with the worker; it is recovered below.
            Err(e) => {
                warn!(error = %e, "batch worker failed");
                worker_errors.push(e.to_string());
                continue;
            }
        };
        if let Some(pos) = in_flight.iter().position(|n| *n == name) {
            in_flight.swap_remove(pos);
        }
    }
    settle_unreported(&mut report, in_flight, worker_errors);

    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        signals = report.total_signals(),
        "batch finished"
    );
    report
}

/// Record every submitted stock that never reported back as a task failure.
fn settle_unreported(report: &mut BatchReport, unreported: Vec<String>, mut worker_errors: Vec<String>) {
    for name in unreported {
        let reason = worker_errors
            .pop()
            .unwrap_or_else(|| "worker exited without a result".to_string());
        warn!(stock = %name, reason = %reason, "analysis lost with its worker");
        report.failed.push((name, BatchError::Task(reason)));
    }
}

/// Sequential equivalent of [`analyze_batch`], in input order.
pub fn analyze_all(
    analyzer: &Analyzer,
    inputs: Vec<(String, BarSeries)>,
) -> Vec<(String, Result<Arc<Analysis>, AnalysisError>)> {
    inputs
        .into_iter()
        .map(|(name, series)| {
            let result = analyzer.analyze(&name, series);
            (name, result)
        })
        .collect()
}
