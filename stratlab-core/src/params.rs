//! Parameter spaces — typed declarations of a strategy's tunable inputs.
//!
//! Each parameter is a tagged `ParamSpec` variant (integer range, real range,
//! or categorical choice set), validated at construction. Concrete
//! assignments are `ParamSet`s: ordered name → value maps, so their display
//! and hashing are deterministic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Declared domain of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamSpec {
    /// Inclusive integer range, optionally on a step grid anchored at `low`.
    Int {
        low: i64,
        high: i64,
        step: Option<i64>,
    },
    /// Inclusive real range, optionally on a step grid anchored at `low`.
    Real {
        low: f64,
        high: f64,
        step: Option<f64>,
    },
    /// Discrete set of named choices.
    Categorical { choices: Vec<String> },
}

impl ParamSpec {
    /// Check the spec's internal consistency. `name` is only for diagnostics.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        match self {
            ParamSpec::Int { low, high, step } => {
                if low > high {
                    return Err(ConfigError::InvalidBounds {
                        name: name.to_string(),
                        low: *low as f64,
                        high: *high as f64,
                    });
                }
                if let Some(step) = step {
                    if *step <= 0 {
                        return Err(ConfigError::NonPositiveStep {
                            name: name.to_string(),
                            step: *step as f64,
                        });
                    }
                }
            }
            ParamSpec::Real { low, high, step } => {
                if low > high {
                    return Err(ConfigError::InvalidBounds {
                        name: name.to_string(),
                        low: *low,
                        high: *high,
                    });
                }
                if let Some(step) = step {
                    if *step <= 0.0 {
                        return Err(ConfigError::NonPositiveStep {
                            name: name.to_string(),
                            step: *step,
                        });
                    }
                }
            }
            ParamSpec::Categorical { choices } => {
                if choices.is_empty() {
                    return Err(ConfigError::EmptyChoices {
                        name: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A concrete parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Real(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Real(v) => Some(v.round() as i64),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Real(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Real(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Assignment of names to concrete values. Ordered, so iteration and
/// serialization are deterministic.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Named, ordered collection of parameter specs. Declared once per strategy
/// template; immutable after validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSpace {
    specs: BTreeMap<String, ParamSpec>,
}

impl ParamSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: ParamSpec) {
        self.specs.insert(name.into(), spec);
    }

    /// Validate every spec. Called once before sampling begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, spec) in &self.specs {
            spec.validate(name)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamSpec)> {
        self.specs.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.get(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl FromIterator<(String, ParamSpec)> for ParamSpace {
    fn from_iter<I: IntoIterator<Item = (String, ParamSpec)>>(iter: I) -> Self {
        Self {
            specs: iter.into_iter().collect(),
        }
    }
}
