//! Surrogate-model sampler — Tree-structured Parzen Estimator.
//!
//! Models the probability of a parameter value belonging to the "good"
//! (low-score) versus "bad" region using kernel density estimates over the
//! observed history, and proposes the candidate maximizing the density
//! ratio l(x)/g(x).
//!
//! The protocol is explicit: `suggest` proposes a point, the caller
//! evaluates it however it likes, then `observe` folds the score back in.
//! The objective always **minimizes**; callers maximizing a metric negate
//! on the way in and back out.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::Normal;

use stratlab_core::error::ConfigError;
use stratlab_core::params::{ParamSet, ParamSpace, ParamSpec, ParamValue};

use crate::sampler::{sample_set, sample_value};

/// One evaluated point: the parameters tried and the (minimized) score.
#[derive(Debug, Clone)]
pub struct Observation {
    pub params: ParamSet,
    pub score: f64,
}

/// TPE sampler over a validated parameter space.
pub struct TpeSampler {
    space: ParamSpace,
    n_initial: usize,
    /// Fraction of history treated as the "good" group.
    gamma: f64,
    /// Candidates scored per numeric parameter per suggestion.
    n_candidates: usize,
    history: Vec<Observation>,
}

impl TpeSampler {
    /// Validates the space up front; sampling assumes it afterwards.
    pub fn new(space: ParamSpace, n_initial: usize) -> Result<Self, ConfigError> {
        space.validate()?;
        Ok(Self {
            space,
            n_initial,
            gamma: 0.2,
            n_candidates: 24,
            history: Vec::new(),
        })
    }

    pub fn space(&self) -> &ParamSpace {
        &self.space
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Record an evaluated point. Failed evaluations can be observed with a
    /// large penalty score so the model learns to avoid the region.
    pub fn observe(&mut self, params: ParamSet, score: f64) {
        self.history.push(Observation { params, score });
    }

    /// Best observation so far (lowest score).
    pub fn best(&self) -> Option<&Observation> {
        self.history
            .iter()
            .min_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Propose the next point. Uniform until `n_initial` observations exist,
    /// adaptive afterwards.
    pub fn suggest<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamSet {
        // An empty history has no good/bad split even when n_initial is 0.
        if self.history.len() < self.n_initial || self.history.is_empty() {
            return sample_set(&self.space, rng);
        }

        // Split history into good (top gamma by score, ascending) and bad.
        let mut sorted: Vec<&Observation> = self.history.iter().collect();
        sorted.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize)
            .clamp(1, sorted.len());
        let (good, bad) = sorted.split_at(n_good);

        self.space
            .iter()
            .map(|(name, spec)| {
                let value = match spec {
                    ParamSpec::Categorical { choices } => {
                        self.suggest_categorical(name, choices, good, rng)
                    }
                    _ => self.suggest_numeric(name, spec, good, bad, rng),
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Categorical: sample from the good group's (Laplace-smoothed)
    /// frequency distribution.
    fn suggest_categorical<R: Rng + ?Sized>(
        &self,
        name: &str,
        choices: &[String],
        good: &[&Observation],
        rng: &mut R,
    ) -> ParamValue {
        let mut weights = vec![1.0_f64; choices.len()];
        for obs in good {
            if let Some(value) = obs.params.get(name).and_then(|v| v.as_str()) {
                if let Some(idx) = choices.iter().position(|c| c == value) {
                    weights[idx] += 1.0;
                }
            }
        }
        let dist = WeightedIndex::new(&weights).expect("positive weights");
        ParamValue::Text(choices[dist.sample(rng)].clone())
    }

    /// Numeric: draw candidates from a Gaussian KDE centered on good
    /// observations and keep the one with the highest l(x)/g(x) ratio.
    fn suggest_numeric<R: Rng + ?Sized>(
        &self,
        name: &str,
        spec: &ParamSpec,
        good: &[&Observation],
        bad: &[&Observation],
        rng: &mut R,
    ) -> ParamValue {
        let collect = |group: &[&Observation]| -> Vec<f64> {
            group
                .iter()
                .filter_map(|obs| obs.params.get(name).and_then(|v| v.as_f64()))
                .collect()
        };
        let good_vals = collect(good);
        let bad_vals = collect(bad);
        if good_vals.is_empty() {
            return sample_value(spec, rng);
        }

        let (low, high) = match spec {
            ParamSpec::Int { low, high, .. } => (*low as f64, *high as f64),
            ParamSpec::Real { low, high, .. } => (*low, *high),
            ParamSpec::Categorical { .. } => unreachable!("numeric path"),
        };
        let sigma = (0.1 * (high - low)).max(1e-9);
        let normal = Normal::new(0.0, sigma).expect("positive sigma");

        let mut best_val = good_vals[0];
        let mut best_ratio = f64::NEG_INFINITY;
        for _ in 0..self.n_candidates {
            let base = good_vals[rng.gen_range(0..good_vals.len())];
            let candidate = (base + normal.sample(rng)).clamp(low, high);

            let lx = kde_density(candidate, &good_vals, sigma);
            let gx = kde_density(candidate, &bad_vals, sigma);
            let ratio = lx / (gx + 1e-10);
            if ratio > best_ratio {
                best_ratio = ratio;
                best_val = candidate;
            }
        }

        snap(spec, best_val)
    }
}

/// Mean Gaussian density of `x` under kernels centered at each observation.
fn kde_density(x: f64, centers: &[f64], sigma: f64) -> f64 {
    if centers.is_empty() {
        return 0.0;
    }
    let norm = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());
    let sum: f64 = centers
        .iter()
        .map(|&c| {
            let z = (x - c) / sigma;
            norm * (-0.5 * z * z).exp()
        })
        .sum();
    sum / centers.len() as f64
}

/// Round a continuous proposal back onto the spec's domain (integer grid,
/// step grid, bounds).
fn snap(spec: &ParamSpec, value: f64) -> ParamValue {
    match spec {
        ParamSpec::Int { low, high, step } => {
            let mut v = value.round() as i64;
            if let Some(step) = step {
                v = low + ((v - low) as f64 / *step as f64).round() as i64 * step;
            }
            ParamValue::Int(v.clamp(*low, *high))
        }
        ParamSpec::Real { low, high, step } => {
            let mut v = value;
            if let Some(step) = step {
                v = low + ((v - low) / step).round() * step;
            }
            ParamValue::Real(v.clamp(*low, *high))
        }
        ParamSpec::Categorical { .. } => unreachable!("numeric path"),
    }
}
