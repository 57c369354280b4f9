//! Benchmark driver and result plotter for the global index table (git)
//! of a LevelDB-style `db_bench` binary.
//!
//! The driver crosses databases, read patterns and git variants, runs the
//! external benchmark for every configuration, averages the repetitions
//! and prints a report. The plotter turns captured or freshly measured
//! results into grouped, log-scaled bar charts.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod config;
pub mod driver;
mod error;
pub mod executor;
pub mod invocation;
/// Tracing subscriber setup.
pub mod logging;
pub mod matrix;
pub mod output;
pub mod plot;
pub mod report;

pub use error::{BenchError, Result};
