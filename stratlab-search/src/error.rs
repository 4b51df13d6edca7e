//! Search-layer errors.
//!
//! Pre-flight failures (`Config`, `Data`) abort a whole search before any
//! task is dispatched. Per-task failures are *not* errors at this level:
//! they are recorded as `TaskFailure` values inside the outcome and never
//! abort sibling tasks.

use thiserror::Error;

use stratlab_core::error::{ConfigError, DataError};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("failed to build worker pool: {0}")]
    Pool(String),
}
