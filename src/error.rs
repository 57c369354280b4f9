use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::output::ParseError;

/// Result alias used throughout the harness.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Every way a benchmark run or a plot can fail.
///
/// None of these are recovered from: the driver aborts the whole matrix on
/// the first error and reports nothing partial.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The benchmark process could not be started at all.
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        /// Program that was executed (the elevation wrapper when enabled).
        program: String,
        /// Underlying OS error.
        source: io::Error,
    },
    /// The benchmark process ran but exited unsuccessfully.
    #[error("`{command}` exited with {status}{}", stderr_suffix(.stderr))]
    ExitStatus {
        /// Rendered command line.
        command: String,
        /// Exit code, or a description of the terminating signal.
        status: String,
        /// Trailing lines of the process's standard error.
        stderr: String,
    },
    /// The benchmark process exceeded its time budget and was killed.
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout {
        /// Rendered command line.
        command: String,
        /// Configured limit.
        timeout: Duration,
    },
    /// The run was cancelled through its cancel token.
    #[error("`{command}` was cancelled")]
    Cancelled {
        /// Rendered command line.
        command: String,
    },
    /// Standard output was not valid UTF-8.
    #[error("`{command}` produced non UTF-8 output")]
    InvalidOutput {
        /// Rendered command line.
        command: String,
    },
    /// The result line could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A plot dataset has no value for the requested cell.
    #[error("no {read} result for database {database} with variant {variant}")]
    MissingPlotEntry {
        /// Read pattern label.
        read: String,
        /// Database label.
        database: String,
        /// Variant label.
        variant: String,
    },
    /// Chart rendering failed.
    #[error("failed to render chart {path}: {message}")]
    Plot {
        /// Target file.
        path: PathBuf,
        /// Backend error text.
        message: String,
    },
    /// Reading or writing a results file failed.
    #[error("results file {path}: {message}")]
    ResultsFile {
        /// File involved.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
    /// CSV export failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// JSON encoding failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Plain I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
