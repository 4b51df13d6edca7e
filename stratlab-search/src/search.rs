//! Search coordinator — parallel random search and sequential Bayesian search.
//!
//! Random search is embarrassingly parallel: parameter sets are sampled up
//! front, fanned out over an explicitly-sized worker pool, and matched back
//! to their origin by task id (the sample index), never by completion order.
//! Bayesian search is the opposite: each proposal must be evaluated and
//! observed before the next one exists, so it runs strictly sequentially.
//!
//! Per-task evaluation failures are recorded and returned alongside the
//! successes; they never abort sibling tasks. A per-task deadline is
//! cooperative: tasks are not preempted, but an overrun is detected when the
//! task completes and reported as a distinct timeout failure, so dispatched
//! vs. completed counts still reconcile.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use stratlab_core::engine::BacktestReport;
use stratlab_core::params::{ParamSet, ParamSpace};

use crate::bayes::TpeSampler;
use crate::error::SearchError;
use crate::sampler::sample;
use crate::seed::SeedHierarchy;

/// What an evaluation closure returns: a report, or a reason for failure.
pub type EvalResult = Result<BacktestReport, String>;

/// One successful evaluation, matched to its origin by task id.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub task_id: usize,
    pub params: ParamSet,
    pub report: BacktestReport,
}

/// One failed evaluation, recorded against its parameter set.
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub task_id: usize,
    pub params: ParamSet,
    pub reason: String,
}

/// Aggregated outcome of a fan-out search.
///
/// `succeeded() + failed() + cancelled` always equals the number of
/// dispatched tasks, so the accounting is reconcilable.
#[derive(Debug, Default, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub failures: Vec<TaskFailure>,
    /// Tasks skipped because cancellation fired before they started.
    pub cancelled: usize,
}

impl SearchOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.failures.is_empty()
    }
}

enum TaskOutcome {
    Done(SearchResult),
    Failed(TaskFailure),
    Skipped,
}

/// Run one evaluation under a cooperative deadline. The closure is not
/// preempted; an overrun is detected on completion and converted into a
/// timeout failure, discarding any late result.
pub(crate) fn evaluate_with_deadline<T>(
    timeout: Option<Duration>,
    run: impl FnOnce() -> Result<T, String>,
) -> Result<T, String> {
    let started = Instant::now();
    let result = run();
    if let Some(limit) = timeout {
        let elapsed = started.elapsed();
        if elapsed > limit {
            return Err(format!(
                "timeout: task ran {}ms, limit {}ms",
                elapsed.as_millis(),
                limit.as_millis()
            ));
        }
    }
    result
}

/// Build the explicit worker pool for a search. Created before dispatch,
/// dropped when the search returns.
pub(crate) fn build_pool(workers: Option<usize>) -> Result<rayon::ThreadPool, SearchError> {
    let threads = workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| SearchError::Pool(e.to_string()))
}

/// Uniform random search: sample `budget` parameter sets, evaluate them in
/// parallel, and return every result and failure.
///
/// Ranking is the caller's job (see [`rank_by_metric`]); the outcome is in
/// task-id order regardless of which worker finished first. A fixed
/// `(space, seed, budget)` reproduces the identical sample sequence.
pub fn random_search<F>(
    space: &ParamSpace,
    evaluate: F,
    budget: usize,
    seed: u64,
    workers: Option<usize>,
    timeout: Option<Duration>,
    cancel: Option<&AtomicBool>,
) -> Result<SearchOutcome, SearchError>
where
    F: Fn(&ParamSet) -> EvalResult + Send + Sync,
{
    space.validate()?;

    let hierarchy = SeedHierarchy::new(seed);
    let mut rng = hierarchy.rng_for("random-search", 0);
    let sets = sample(space, budget, &mut rng);

    let pool = build_pool(workers)?;
    let outcomes: Vec<TaskOutcome> = pool.install(|| {
        sets.par_iter()
            .enumerate()
            .map(|(task_id, params)| {
                if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    return TaskOutcome::Skipped;
                }
                match evaluate_with_deadline(timeout, || evaluate(params)) {
                    Ok(report) => TaskOutcome::Done(SearchResult {
                        task_id,
                        params: params.clone(),
                        report,
                    }),
                    Err(reason) => TaskOutcome::Failed(TaskFailure {
                        task_id,
                        params: params.clone(),
                        reason,
                    }),
                }
            })
            .collect()
    });

    Ok(collect_outcomes(outcomes))
}

fn collect_outcomes(outcomes: Vec<TaskOutcome>) -> SearchOutcome {
    let mut out = SearchOutcome::default();
    for outcome in outcomes {
        match outcome {
            TaskOutcome::Done(result) => out.results.push(result),
            TaskOutcome::Failed(failure) => out.failures.push(failure),
            TaskOutcome::Skipped => out.cancelled += 1,
        }
    }
    out
}

/// Sort results by a named metric, descending.
///
/// Ties break deterministically: lower equity-return variance first, then
/// lower task id — never the order workers happened to finish in.
pub fn rank_by_metric(results: &mut [SearchResult], metric: &str) -> Result<(), SearchError> {
    // Probe the name against a report so a typo fails loudly.
    if BacktestReport::default().metric_by_name(metric).is_none() {
        return Err(SearchError::UnknownMetric(metric.to_string()));
    }

    results.sort_by(|a, b| {
        let ka = a.report.metric_by_name(metric).unwrap_or(f64::NEG_INFINITY);
        let kb = b.report.metric_by_name(metric).unwrap_or(f64::NEG_INFINITY);
        kb.partial_cmp(&ka)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.report
                    .equity_return_variance()
                    .partial_cmp(&b.report.equity_return_variance())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
    Ok(())
}

/// Outcome of a Bayesian search.
#[derive(Debug)]
pub struct BayesOutcome {
    /// Best parameters and (maximized) metric score, if anything succeeded.
    pub best: Option<(ParamSet, f64)>,
    /// Number of evaluations performed (successes plus failures).
    pub evaluated: usize,
    pub failures: Vec<TaskFailure>,
}

/// Sequential surrogate-model search maximizing `metric`.
///
/// The first `n_initial` proposals are unbiased random draws; the remaining
/// `n_calls - n_initial` come from the TPE model. Each score must be folded
/// back into the model before the next proposal, so there is no parallelism
/// here by design. The model minimizes, so metric scores are negated on
/// observation and negated back in the outcome.
#[allow(clippy::too_many_arguments)]
pub fn bayesian_search<F>(
    space: &ParamSpace,
    evaluate: F,
    metric: &str,
    n_initial: usize,
    n_calls: usize,
    seed: u64,
    timeout: Option<Duration>,
    cancel: Option<&AtomicBool>,
) -> Result<BayesOutcome, SearchError>
where
    F: Fn(&ParamSet) -> EvalResult,
{
    if BacktestReport::default().metric_by_name(metric).is_none() {
        return Err(SearchError::UnknownMetric(metric.to_string()));
    }

    let mut sampler = TpeSampler::new(space.clone(), n_initial)?;
    let mut rng = SeedHierarchy::new(seed).rng_for("bayes-search", 0);

    let mut best: Option<(ParamSet, f64)> = None;
    let mut failures = Vec::new();
    let mut evaluated = 0;

    for task_id in 0..n_calls {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            break;
        }

        let params = sampler.suggest(&mut rng);
        evaluated += 1;
        match evaluate_with_deadline(timeout, || evaluate(&params)) {
            Ok(report) => {
                let score = report
                    .metric_by_name(metric)
                    .expect("metric validated above");
                if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
                    best = Some((params.clone(), score));
                }
                sampler.observe(params, -score);
            }
            Err(reason) => {
                failures.push(TaskFailure {
                    task_id,
                    params: params.clone(),
                    reason,
                });
                // Teach the model to avoid the region.
                sampler.observe(params, f64::INFINITY);
            }
        }
    }

    Ok(BayesOutcome {
        best,
        evaluated,
        failures,
    })
}
