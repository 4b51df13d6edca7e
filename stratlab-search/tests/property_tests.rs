//! Property-based invariants for sampling and search ordering.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use stratlab_core::engine::BacktestReport;
use stratlab_core::params::{ParamSet, ParamSpace, ParamSpec};
use stratlab_search::sampler::{sample, sample_value};
use stratlab_search::search::{rank_by_metric, SearchResult};

proptest! {
    /// Integer draws always land inside the declared bounds, stepped or not.
    #[test]
    fn int_draws_respect_bounds(
        low in -1_000i64..1_000,
        span in 0i64..1_000,
        step in prop::option::of(1i64..50),
        seed in any::<u64>(),
    ) {
        let high = low + span;
        let spec = ParamSpec::Int { low, high, step };
        prop_assume!(spec.validate("p").is_ok());

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..32 {
            let value = sample_value(&spec, &mut rng).as_i64().unwrap();
            prop_assert!((low..=high).contains(&value));
            if let Some(step) = step {
                prop_assert_eq!((value - low) % step, 0);
            }
        }
    }

    /// Real draws always land inside the declared bounds.
    #[test]
    fn real_draws_respect_bounds(
        low in -1_000.0f64..1_000.0,
        span in 0.0f64..1_000.0,
        seed in any::<u64>(),
    ) {
        let high = low + span;
        let spec = ParamSpec::Real { low, high, step: None };
        prop_assume!(spec.validate("p").is_ok());

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..32 {
            let value = sample_value(&spec, &mut rng).as_f64().unwrap();
            prop_assert!(value >= low && value <= high);
        }
    }

    /// A fixed seed reproduces an identical sample sequence for any space.
    #[test]
    fn sampling_is_seed_deterministic(seed in any::<u64>(), n in 0usize..32) {
        let mut space = ParamSpace::new();
        space.insert("period", ParamSpec::Int { low: 1, high: 100, step: None });
        space.insert("threshold", ParamSpec::Real { low: 0.0, high: 1.0, step: None });

        let a = sample(&space, n, &mut StdRng::seed_from_u64(seed));
        let b = sample(&space, n, &mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(a, b);
    }

    /// Ranking sorts the chosen metric into non-increasing order and keeps
    /// every result.
    #[test]
    fn ranking_is_a_permutation_in_metric_order(profits in prop::collection::vec(-1e6f64..1e6, 0..40)) {
        let mut results: Vec<SearchResult> = profits
            .iter()
            .enumerate()
            .map(|(task_id, &net_profit)| SearchResult {
                task_id,
                params: ParamSet::new(),
                report: BacktestReport { net_profit, ..BacktestReport::default() },
            })
            .collect();

        rank_by_metric(&mut results, "net_profit").unwrap();

        prop_assert_eq!(results.len(), profits.len());
        for pair in results.windows(2) {
            prop_assert!(pair[0].report.net_profit >= pair[1].report.net_profit);
        }

        let mut ids: Vec<usize> = results.iter().map(|r| r.task_id).collect();
        ids.sort_unstable();
        prop_assert_eq!(ids, (0..profits.len()).collect::<Vec<_>>());
    }
}
