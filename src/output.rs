//! Extraction of the result record from `db_bench` standard output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum whitespace-separated fields on a result line.
const MIN_FIELDS: usize = 5;
/// Zero-based index of the operation count; build and search time follow.
const FIRST_VALUE_FIELD: usize = 2;

/// Measurements reported by a single invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Operations performed by the read phase.
    pub op_count: f64,
    /// Time spent building the global index table, in milliseconds.
    pub build_ms: f64,
    /// Time spent serving reads, in milliseconds.
    pub search_ms: f64,
}

/// How the result line is located in the output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ResultLocator {
    /// The last non-blank line.
    #[default]
    LastLine,
    /// The last line whose first field equals the tag.
    Tagged(String),
}

/// Why a result line could not be extracted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Output was empty or had no line carrying the tag.
    #[error("benchmark output has no result line{}", tag_suffix(.tag))]
    MissingLine {
        /// Tag that was searched for, if any.
        tag: Option<String>,
    },
    /// The line is too short.
    #[error("result line has {found} fields, expected at least 5: {line:?}")]
    TooFewFields {
        /// Offending line.
        line: String,
        /// Fields present.
        found: usize,
    },
    /// A value field is not a number.
    #[error("result field {field} is not a number ({token:?}) in {line:?}")]
    InvalidNumber {
        /// Name of the field.
        field: &'static str,
        /// Offending token.
        token: String,
        /// Offending line.
        line: String,
    },
    /// Search time is normalized per operation, so a run must perform some.
    #[error("result line reports {op_count} operations, expected a positive count: {line:?}")]
    NonPositiveOpCount {
        /// Parsed operation count.
        op_count: f64,
        /// Offending line.
        line: String,
    },
}

fn tag_suffix(tag: &Option<String>) -> String {
    tag.as_ref()
        .map(|tag| format!(" tagged '{tag}'"))
        .unwrap_or_default()
}

/// Parses the result record out of a complete stdout capture.
pub fn parse_run_output(stdout: &str, locator: &ResultLocator) -> Result<RunResult, ParseError> {
    let line = match locator {
        ResultLocator::LastLine => stdout.lines().rev().find(|line| !line.trim().is_empty()),
        ResultLocator::Tagged(tag) => stdout
            .lines()
            .rev()
            .find(|line| line.split_whitespace().next() == Some(tag.as_str())),
    };
    let line = line.ok_or_else(|| ParseError::MissingLine {
        tag: match locator {
            ResultLocator::LastLine => None,
            ResultLocator::Tagged(tag) => Some(tag.clone()),
        },
    })?;
    parse_result_line(line)
}

/// Parses fields 3 to 5 of a single line.
pub fn parse_result_line(line: &str) -> Result<RunResult, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(ParseError::TooFewFields {
            line: line.to_string(),
            found: fields.len(),
        });
    }
    let value = |offset: usize, field: &'static str| {
        let token = fields[FIRST_VALUE_FIELD + offset];
        token
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::InvalidNumber {
                field,
                token: token.to_string(),
                line: line.to_string(),
            })
    };
    let op_count = value(0, "op_count")?;
    if op_count <= 0.0 {
        return Err(ParseError::NonPositiveOpCount {
            op_count,
            line: line.to_string(),
        });
    }
    Ok(RunResult {
        op_count,
        build_ms: value(1, "build_ms")?,
        search_ms: value(2, "search_ms")?,
    })
}
