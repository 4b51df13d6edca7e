//! StratLab CLI — backtest, optimize, and scan commands.
//!
//! Commands:
//! - `backtest` — run one simulation over a CSV price file and print the report
//! - `optimize` — random or Bayesian parameter search for a built-in strategy
//! - `scan` — evaluate every symbol × period × template combination to CSV

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use stratlab_core::data::load_csv;
use stratlab_core::domain::PriceSeries;
use stratlab_core::engine::{simulate, BacktestReport, SimulationConfig};
use stratlab_core::params::{ParamSet, ParamValue};
use stratlab_core::strategy::{MacdCross, RsiThreshold, SignalProvider};
use stratlab_core::template::StrategyTemplate;
use stratlab_search::scan::{cross_product, evaluate_scan_task, scan};
use stratlab_search::search::{bayesian_search, random_search, rank_by_metric, EvalResult};
use stratlab_search::write_scan_csv;

#[derive(Parser)]
#[command(
    name = "stratlab",
    about = "StratLab CLI — strategy backtesting and parameter search"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest over a CSV price file and print the report.
    Backtest {
        /// Path to the OHLCV CSV file.
        #[arg(long)]
        data: PathBuf,

        /// Built-in strategy: macd or rsi.
        #[arg(long, default_value = "macd")]
        strategy: String,

        /// Parameter override, repeatable (e.g. --set "Fast EMA Period=10").
        #[arg(long = "set")]
        sets: Vec<String>,

        /// Optional TOML file with simulation settings.
        #[arg(long)]
        sim_config: Option<PathBuf>,

        /// Restrict to bars on or after this date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Restrict to bars on or before this date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Emit the full report as JSON instead of the text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Search the strategy's parameter space for the best metric value.
    Optimize {
        /// Path to the OHLCV CSV file.
        #[arg(long)]
        data: PathBuf,

        /// Built-in strategy: macd or rsi.
        #[arg(long, default_value = "macd")]
        strategy: String,

        /// Metric to maximize (e.g. net_profit, win_rate, max_drawdown_pct).
        #[arg(long, default_value = "net_profit")]
        metric: String,

        /// Number of random evaluations.
        #[arg(long, default_value_t = 100)]
        budget: usize,

        /// Master seed for reproducible sampling.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Worker threads. Defaults to available parallelism.
        #[arg(long)]
        workers: Option<usize>,

        /// Use the surrogate-model (TPE) search instead of random search.
        #[arg(long, default_value_t = false)]
        bayes: bool,

        /// Random startup evaluations before the model kicks in (with --bayes).
        #[arg(long, default_value_t = 10)]
        n_initial: usize,

        /// Number of results to print (random search only).
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Per-task timeout in milliseconds; overruns count as failures.
        #[arg(long)]
        task_timeout_ms: Option<u64>,

        /// Optional TOML file with simulation settings.
        #[arg(long)]
        sim_config: Option<PathBuf>,
    },
    /// Evaluate every symbol × period × template combination and write CSV.
    Scan {
        /// Directory of OHLCV CSV files, one per symbol.
        #[arg(long)]
        data_dir: PathBuf,

        /// Periods as start:end pairs (e.g. 2023-01-01:2023-06-30,2023-07-01:2023-12-31).
        #[arg(long)]
        periods: String,

        /// Directory of .pine strategy templates.
        #[arg(long)]
        templates_dir: PathBuf,

        /// Worker threads. Defaults to available parallelism.
        #[arg(long)]
        workers: Option<usize>,

        /// Per-task timeout in milliseconds; overruns count as failures.
        #[arg(long)]
        task_timeout_ms: Option<u64>,

        /// Output CSV path.
        #[arg(long, default_value = "scan.csv")]
        out: PathBuf,

        /// Optional TOML file with simulation settings.
        #[arg(long)]
        sim_config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            data,
            strategy,
            sets,
            sim_config,
            start,
            end,
            json,
        } => run_backtest(data, &strategy, &sets, sim_config, start, end, json),
        Commands::Optimize {
            data,
            strategy,
            metric,
            budget,
            seed,
            workers,
            bayes,
            n_initial,
            top,
            task_timeout_ms,
            sim_config,
        } => run_optimize(
            data,
            &strategy,
            &metric,
            budget,
            seed,
            workers,
            bayes,
            n_initial,
            top,
            task_timeout_ms.map(Duration::from_millis),
            sim_config,
        ),
        Commands::Scan {
            data_dir,
            periods,
            templates_dir,
            workers,
            task_timeout_ms,
            out,
            sim_config,
        } => run_scan(
            data_dir,
            &periods,
            templates_dir,
            workers,
            task_timeout_ms.map(Duration::from_millis),
            out,
            sim_config,
        ),
    }
}

// ─── backtest ───────────────────────────────────────────────────────

fn run_backtest(
    data: PathBuf,
    strategy: &str,
    sets: &[String],
    sim_config: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> Result<()> {
    let provider = build_provider(strategy)?;
    let config = load_sim_config(sim_config.as_deref())?;
    config.validate()?;

    let prices = load_prices(&data, start.as_deref(), end.as_deref())?;
    let params = parse_param_sets(sets)?;

    let signals = provider.signals(&prices, &params);
    let report = simulate(&prices, &signals, &config);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(provider.name(), &report);
    }
    Ok(())
}

// ─── optimize ───────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_optimize(
    data: PathBuf,
    strategy: &str,
    metric: &str,
    budget: usize,
    seed: u64,
    workers: Option<usize>,
    bayes: bool,
    n_initial: usize,
    top: usize,
    task_timeout: Option<Duration>,
    sim_config: Option<PathBuf>,
) -> Result<()> {
    let provider = build_provider(strategy)?;
    let config = load_sim_config(sim_config.as_deref())?;
    config.validate()?;

    let prices = load_prices(&data, None, None)?;
    let space = provider.space();

    let evaluate = |params: &ParamSet| -> EvalResult {
        let signals = provider.signals(&prices, params);
        Ok(simulate(&prices, &signals, &config))
    };

    if bayes {
        let outcome = bayesian_search(
            &space,
            evaluate,
            metric,
            n_initial,
            budget,
            seed,
            task_timeout,
            None,
        )?;
        match outcome.best {
            Some((params, score)) => {
                println!("Evaluated: {}", outcome.evaluated);
                println!("Best {metric}: {score:.4}");
                println!("Parameters:");
                for (name, value) in &params {
                    println!("  {name} = {value}");
                }
            }
            None => println!("No successful evaluations."),
        }
        return Ok(());
    }

    let mut outcome =
        random_search(&space, evaluate, budget, seed, workers, task_timeout, None)?;
    rank_by_metric(&mut outcome.results, metric)?;

    println!(
        "Evaluated {} parameter sets ({} failed).",
        outcome.succeeded() + outcome.failed(),
        outcome.failed()
    );
    println!();
    for result in outcome.results.iter().take(top) {
        let score = result
            .report
            .metric_by_name(metric)
            .context("metric validated by ranking")?;
        let params: Vec<String> = result
            .params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!("#{:<4} {metric}={score:<12.4} {}", result.task_id, params.join(", "));
    }
    Ok(())
}

// ─── scan ───────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_scan(
    data_dir: PathBuf,
    periods: &str,
    templates_dir: PathBuf,
    workers: Option<usize>,
    task_timeout: Option<Duration>,
    out: PathBuf,
    sim_config: Option<PathBuf>,
) -> Result<()> {
    let config = load_sim_config(sim_config.as_deref())?;
    config.validate()?;

    let series = load_series_dir(&data_dir)?;
    if series.is_empty() {
        bail!("no CSV files found in {}", data_dir.display());
    }

    let periods = parse_periods(periods)?;

    let (templates, warnings) = StrategyTemplate::load_dir(&templates_dir)?;
    for warning in &warnings {
        eprintln!("WARNING: {warning}");
    }
    if templates.is_empty() {
        bail!("no usable templates in {}", templates_dir.display());
    }

    let mut bound: Vec<(String, Arc<dyn SignalProvider>, ParamSet)> = Vec::new();
    for template in &templates {
        let provider = provider_for_template(template.name())?;
        bound.push((template.name().to_string(), provider, template.default_set()));
    }

    let tasks = cross_product(&series, &periods, &bound, &config);
    let total = tasks.len();
    println!(
        "Scanning {} series × {} periods × {} templates = {total} tasks",
        series.len(),
        periods.len(),
        bound.len()
    );

    let progress = |done: usize, total: usize| {
        if done % 50 == 0 || done == total {
            println!("  {done}/{total}");
        }
    };
    let outcome = scan(
        &tasks,
        evaluate_scan_task,
        workers,
        task_timeout,
        None,
        Some(&progress),
    )?;

    for failure in &outcome.failures {
        eprintln!("Task {} failed: {}", failure.task_id, failure.reason);
    }

    write_scan_csv(&out, &outcome.rows)?;
    println!(
        "Wrote {} rows to {} ({} failed).",
        outcome.succeeded(),
        out.display(),
        outcome.failed()
    );
    Ok(())
}

// ─── shared helpers ─────────────────────────────────────────────────

fn build_provider(name: &str) -> Result<Arc<dyn SignalProvider>> {
    match name {
        "macd" => Ok(Arc::new(MacdCross::default())),
        "rsi" => Ok(Arc::new(RsiThreshold::default())),
        _ => bail!("unknown strategy '{name}'. Valid: macd, rsi"),
    }
}

/// Bind a template to a built-in provider by its name prefix.
fn provider_for_template(name: &str) -> Result<Arc<dyn SignalProvider>> {
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("macd") {
        Ok(Arc::new(MacdCross::default()))
    } else if lower.starts_with("rsi") {
        Ok(Arc::new(RsiThreshold::default()))
    } else {
        bail!("no signal provider for template '{name}' (expected a macd* or rsi* name)")
    }
}

fn load_sim_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("invalid simulation config in {}", path.display()))
        }
        None => Ok(SimulationConfig::default()),
    }
}

fn load_prices(path: &Path, start: Option<&str>, end: Option<&str>) -> Result<PriceSeries> {
    let prices =
        load_csv(path).with_context(|| format!("failed to load {}", path.display()))?;
    if prices.is_empty() {
        bail!("no usable bars in {}", path.display());
    }

    match (start, end) {
        (None, None) => Ok(prices),
        _ => {
            let start = parse_date_opt(start)?
                .unwrap_or(NaiveDate::MIN);
            let end = parse_date_opt(end)?
                .unwrap_or(NaiveDate::MAX);
            Ok(prices.window(start, end))
        }
    }
}

fn parse_date_opt(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
    })
    .transpose()
}

/// Parse `start:end[,start:end...]` into inclusive date pairs.
fn parse_periods(spec: &str) -> Result<Vec<(NaiveDate, NaiveDate)>> {
    let mut periods = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        let Some((start, end)) = part.split_once(':') else {
            bail!("invalid period '{part}' (expected start:end)");
        };
        let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid period start in '{part}'"))?;
        let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid period end in '{part}'"))?;
        if end < start {
            bail!("period '{part}' ends before it starts");
        }
        periods.push((start, end));
    }
    if periods.is_empty() {
        bail!("no periods given");
    }
    Ok(periods)
}

/// Parse repeated `name=value` overrides. Values prefer integer, then real,
/// and fall back to text.
fn parse_param_sets(sets: &[String]) -> Result<ParamSet> {
    let mut params = ParamSet::new();
    for set in sets {
        let Some((name, value)) = set.split_once('=') else {
            bail!("invalid --set '{set}' (expected name=value)");
        };
        let name = name.trim().to_string();
        let value = value.trim();
        let parsed = if let Ok(i) = value.parse::<i64>() {
            ParamValue::Int(i)
        } else if let Ok(f) = value.parse::<f64>() {
            ParamValue::Real(f)
        } else {
            ParamValue::Text(value.to_string())
        };
        params.insert(name, parsed);
    }
    Ok(params)
}

/// Load every CSV in a directory as a named price series. The file stem is
/// the series id.
fn load_series_dir(dir: &Path) -> Result<Vec<(String, Arc<PriceSeries>)>> {
    let mut series = Vec::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();
    entries.sort();

    for path in entries {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let prices =
            load_csv(&path).with_context(|| format!("failed to load {}", path.display()))?;
        series.push((id, Arc::new(prices)));
    }
    Ok(series)
}

fn print_report(strategy: &str, report: &BacktestReport) {
    println!();
    println!("=== Backtest Report ===");
    println!("Strategy:        {strategy}");
    println!("Net Profit:      {:.2}", report.net_profit);
    println!("Gross Profit:    {:.2}", report.gross_profit);
    println!("Gross Loss:      {:.2}", report.gross_loss);
    println!();
    println!("Trades:          {}", report.total_trades);
    println!("Wins / Losses:   {} / {}", report.wins, report.losses);
    println!("Win Rate:        {:.1}%", report.win_rate);
    println!();
    println!("Buy & Hold:      {:.2} ({:.2}%)", report.buy_hold_value, report.buy_hold_pct);
    println!(
        "Max Run-up:      {:.2} ({:.2}%)",
        report.max_runup_value, report.max_runup_pct
    );
    println!(
        "Max Drawdown:    {:.2} ({:.2}%)",
        report.max_drawdown_value, report.max_drawdown_pct
    );
    println!("Max Contracts:   {:.4}", report.max_contracts_held);
    println!(
        "Max Trades:      {}/day, {}/week",
        report.max_trades_day, report.max_trades_week
    );
    println!();
}
