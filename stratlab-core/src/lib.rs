//! StratLab Core — simulation engine, domain types, parameter spaces,
//! signal providers, and the Pine template boundary.
//!
//! The heart of the crate is [`engine::simulate`]: a deterministic,
//! single-pass replay of a signal sequence against a price series that
//! produces an immutable [`engine::BacktestReport`]. Everything else exists
//! to feed it:
//! - Domain types (bars, validated price series, signals)
//! - Typed parameter spaces and concrete parameter sets
//! - Built-in signal providers (MACD crossover, RSI thresholds)
//! - Pine template parsing and parameter injection
//! - CSV price ingestion
//!
//! Search orchestration (sampling, parallel fan-out, ranking) lives in
//! `stratlab-search`.

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod params;
pub mod strategy;
pub mod template;
