//! Error taxonomy for the core crate.
//!
//! Two families, both fatal and raised before any simulation runs:
//! - `ConfigError`: a parameter spec or simulation config fails validation.
//! - `DataError`: a price series fails ingestion or structural checks.
//!
//! Per-task evaluation failures during a search are a coordinator concern
//! and live in `stratlab-search`.

use thiserror::Error;

/// Malformed parameter spec or simulation config. Pre-flight, fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parameter '{name}': low bound {low} exceeds high bound {high}")]
    InvalidBounds { name: String, low: f64, high: f64 },

    #[error("parameter '{name}': step must be positive, got {step}")]
    NonPositiveStep { name: String, step: f64 },

    #[error("parameter '{name}': categorical choice set is empty")]
    EmptyChoices { name: String },

    #[error("initial capital must be positive, got {0}")]
    NonPositiveCapital(f64),

    #[error("order size must be in (0, 100] percent, got {0}")]
    OrderSizeOutOfRange(f64),

    #[error("{field} must be non-negative, got {value}")]
    NegativeAdjustment { field: &'static str, value: f64 },
}

/// Structurally invalid or unreadable price data. Fatal.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("timestamps must be strictly increasing (violation at bar {index})")]
    NonMonotonicTimestamps { index: usize },

    #[error("non-finite close at bar {index}")]
    BadClose { index: usize },

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("unparsable timestamp '{0}'")]
    BadTimestamp(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
