//! Uniform random sampling of parameter spaces.
//!
//! Each draw is independent and uniform within the parameter's declared
//! domain: continuous for `Real`, discrete inclusive for `Int`, uniform
//! choice for `Categorical`. A `step` snaps draws to the grid anchored at
//! the low bound. The rng is an explicit, seedable stream — no hidden
//! global state — so a fixed seed reproduces an identical sequence.

use rand::seq::SliceRandom;
use rand::Rng;

use stratlab_core::params::{ParamSet, ParamSpace, ParamSpec, ParamValue};

/// Draw one value uniformly from a spec's domain.
pub fn sample_value<R: Rng + ?Sized>(spec: &ParamSpec, rng: &mut R) -> ParamValue {
    match spec {
        ParamSpec::Int { low, high, step } => {
            let value = match step {
                Some(step) => {
                    let points = (high - low) / step + 1;
                    low + rng.gen_range(0..points) * step
                }
                None => rng.gen_range(*low..=*high),
            };
            ParamValue::Int(value)
        }
        ParamSpec::Real { low, high, step } => {
            let value = if low == high {
                *low
            } else {
                match step {
                    Some(step) => {
                        let points = ((high - low) / step).floor() as i64 + 1;
                        low + rng.gen_range(0..points) as f64 * step
                    }
                    None => rng.gen_range(*low..*high),
                }
            };
            ParamValue::Real(value)
        }
        ParamSpec::Categorical { choices } => {
            // Validation guarantees a non-empty choice set.
            let choice = choices.choose(rng).expect("validated non-empty choices");
            ParamValue::Text(choice.clone())
        }
    }
}

/// Draw one complete parameter set.
pub fn sample_set<R: Rng + ?Sized>(space: &ParamSpace, rng: &mut R) -> ParamSet {
    space
        .iter()
        .map(|(name, spec)| (name.clone(), sample_value(spec, rng)))
        .collect()
}

/// Draw `n` independent parameter sets.
pub fn sample<R: Rng + ?Sized>(space: &ParamSpace, n: usize, rng: &mut R) -> Vec<ParamSet> {
    (0..n).map(|_| sample_set(space, rng)).collect()
}
