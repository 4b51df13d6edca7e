//! StratLab Search — parameter search and multi-target scanning.
//!
//! This crate builds on `stratlab-core` to provide:
//! - Deterministic seed hierarchy for parallel sampling streams
//! - Uniform random sampling over parameter spaces
//! - Surrogate-model (TPE) sampling with an explicit suggest/observe loop
//! - Parallel random search with ranking and partial-failure tolerance
//! - Multi-target scans over symbol × period × template cross-products
//! - CSV/JSON export of search and scan artifacts

pub mod bayes;
pub mod error;
pub mod export;
pub mod sampler;
pub mod scan;
pub mod search;
pub mod seed;

pub use bayes::{Observation, TpeSampler};
pub use error::SearchError;
pub use export::{results_json, scan_csv, write_scan_csv};
pub use sampler::{sample, sample_set, sample_value};
pub use scan::{cross_product, evaluate_scan_task, scan, ScanOutcome, ScanRow, ScanTask};
pub use search::{
    bayesian_search, random_search, rank_by_metric, BayesOutcome, EvalResult, SearchOutcome,
    SearchResult, TaskFailure,
};
pub use seed::SeedHierarchy;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn search_result_is_send_sync() {
        assert_send::<SearchResult>();
        assert_sync::<SearchResult>();
    }

    #[test]
    fn search_outcome_is_send_sync() {
        assert_send::<SearchOutcome>();
        assert_sync::<SearchOutcome>();
    }

    #[test]
    fn task_failure_is_send_sync() {
        assert_send::<TaskFailure>();
        assert_sync::<TaskFailure>();
    }

    #[test]
    fn scan_task_is_send_sync() {
        assert_send::<ScanTask>();
        assert_sync::<ScanTask>();
    }

    #[test]
    fn scan_row_is_send_sync() {
        assert_send::<ScanRow>();
        assert_sync::<ScanRow>();
    }

    #[test]
    fn tpe_sampler_is_send_sync() {
        assert_send::<TpeSampler>();
        assert_sync::<TpeSampler>();
    }

    #[test]
    fn seed_hierarchy_is_send_sync() {
        assert_send::<SeedHierarchy>();
        assert_sync::<SeedHierarchy>();
    }
}
