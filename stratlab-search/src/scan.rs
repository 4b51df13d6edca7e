//! Multi-target scan — symbol × period × template cross-product.
//!
//! Every task is fully independent (its own price slice and template), so
//! the scan is embarrassingly parallel: completion order is irrelevant and
//! rows are aggregated back into task order. A task without an explicit
//! parameter set always falls back to the template's declared defaults —
//! an explicit policy, not an accident.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use stratlab_core::domain::PriceSeries;
use stratlab_core::engine::{simulate, BacktestReport, SimulationConfig};
use stratlab_core::params::ParamSet;
use stratlab_core::strategy::SignalProvider;

use crate::error::SearchError;
use crate::search::{build_pool, evaluate_with_deadline, TaskFailure};

/// One independent evaluation target.
#[derive(Clone)]
pub struct ScanTask {
    /// Identifier of the price series (typically the symbol).
    pub series_id: String,
    pub prices: Arc<PriceSeries>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub provider: Arc<dyn SignalProvider>,
    pub template_name: String,
    /// Explicit parameter set; `None` falls back to `defaults`.
    pub params: Option<ParamSet>,
    /// Declared defaults of the template backing this task.
    pub defaults: ParamSet,
    pub config: SimulationConfig,
}

impl ScanTask {
    /// The parameter set this task will actually run with.
    pub fn effective_params(&self) -> ParamSet {
        self.params.clone().unwrap_or_else(|| self.defaults.clone())
    }
}

/// One row of the scan results table. Column order is the persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    pub series_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub template_name: String,
    pub net_profit: f64,
    pub win_rate: f64,
}

/// Aggregated scan outcome: rows in task order, failures recorded per task.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub rows: Vec<ScanRow>,
    pub failures: Vec<TaskFailure>,
    pub cancelled: usize,
}

impl ScanOutcome {
    pub fn succeeded(&self) -> usize {
        self.rows.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// The standard task evaluator: slice the series to the task's period,
/// resolve parameters (explicit set or declared defaults), generate
/// signals, simulate. An empty window is not a failure; the engine reports
/// all-zero metrics for it.
pub fn evaluate_scan_task(task: &ScanTask) -> Result<BacktestReport, String> {
    task.config.validate().map_err(|e| e.to_string())?;
    let window = task.prices.window(task.period_start, task.period_end);
    let params = task.effective_params();
    let signals = task.provider.signals(&window, &params);
    Ok(simulate(&window, &signals, &task.config))
}

/// Run every task on an explicitly-sized pool, collecting rows and failures.
///
/// `timeout` is a cooperative per-task deadline: a task that overruns it is
/// recorded as a timeout failure instead of a row. `progress`, when given,
/// is invoked after each task with `(completed, total)`; completion order is
/// arbitrary but the final rows are deterministic for fixed inputs.
pub fn scan<F>(
    tasks: &[ScanTask],
    evaluate: F,
    workers: Option<usize>,
    timeout: Option<Duration>,
    cancel: Option<&AtomicBool>,
    progress: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> Result<ScanOutcome, SearchError>
where
    F: Fn(&ScanTask) -> Result<BacktestReport, String> + Send + Sync,
{
    // An empty task list is an empty outcome, not an error.
    if tasks.is_empty() {
        return Ok(ScanOutcome::default());
    }

    let pool = build_pool(workers)?;
    let total = tasks.len();
    let completed = AtomicUsize::new(0);

    enum Row {
        Done(ScanRow),
        Failed(TaskFailure),
        Skipped,
    }

    let outcomes: Vec<Row> = pool.install(|| {
        tasks
            .par_iter()
            .enumerate()
            .map(|(task_id, task)| {
                if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    return Row::Skipped;
                }
                let outcome = match evaluate_with_deadline(timeout, || evaluate(task)) {
                    Ok(report) => Row::Done(ScanRow {
                        series_id: task.series_id.clone(),
                        period_start: task.period_start,
                        period_end: task.period_end,
                        template_name: task.template_name.clone(),
                        net_profit: report.net_profit,
                        win_rate: report.win_rate,
                    }),
                    Err(reason) => Row::Failed(TaskFailure {
                        task_id,
                        params: task.effective_params(),
                        reason,
                    }),
                };
                if let Some(cb) = progress {
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    cb(done, total);
                }
                outcome
            })
            .collect()
    });

    let mut result = ScanOutcome::default();
    for outcome in outcomes {
        match outcome {
            Row::Done(row) => result.rows.push(row),
            Row::Failed(failure) => result.failures.push(failure),
            Row::Skipped => result.cancelled += 1,
        }
    }
    Ok(result)
}

/// Build the cross-product of series × periods × templates as scan tasks.
pub fn cross_product(
    series: &[(String, Arc<PriceSeries>)],
    periods: &[(NaiveDate, NaiveDate)],
    templates: &[(String, Arc<dyn SignalProvider>, ParamSet)],
    config: &SimulationConfig,
) -> Vec<ScanTask> {
    let mut tasks = Vec::new();
    for (series_id, prices) in series {
        for &(period_start, period_end) in periods {
            for (template_name, provider, defaults) in templates {
                tasks.push(ScanTask {
                    series_id: series_id.clone(),
                    prices: Arc::clone(prices),
                    period_start,
                    period_end,
                    provider: Arc::clone(provider),
                    template_name: template_name.clone(),
                    params: None,
                    defaults: defaults.clone(),
                    config: config.clone(),
                });
            }
        }
    }
    tasks
}
