//! Human-readable report plus JSON and CSV exports of a result table.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregatedResult, ConfigResult, ResultTable};
use crate::error::{BenchError, Result};
use crate::matrix::{GitVariant, ReadPattern};

/// Printed after each read-pattern group.
pub const READ_SEPARATOR: &str = "------------------------------------";
/// Printed after each database group.
pub const DATABASE_SEPARATOR: &str =
    "*************************************************************************";

/// One report line.
pub fn format_line(entry: &ConfigResult) -> String {
    format!(
        "{} {} {}, build time {:.2} ms, search time {:.2} ms per 100000 ops",
        entry.database,
        entry.read,
        entry.variant,
        entry.result.build_ms,
        entry.result.search_ms_per_100k_ops()
    )
}

/// Renders the table with separators between read-pattern and database
/// groups. Entries must be in matrix order.
pub fn render_text(table: &ResultTable) -> String {
    let mut out = String::new();
    let entries = table.entries();
    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(out, "{}", format_line(entry));
        let next = entries.get(i + 1);
        let database_ends = next.map_or(true, |n| n.database != entry.database);
        let read_ends = database_ends || next.is_some_and(|n| n.read != entry.read);
        if read_ends {
            let _ = writeln!(out, "{READ_SEPARATOR}");
        }
        if database_ends {
            let _ = writeln!(out, "{DATABASE_SEPARATOR}");
        }
    }
    out
}

/// Serialized form of a finished run, consumed by `gitbench plot --results`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultsFile {
    /// Runs averaged per configuration.
    pub repetitions: usize,
    /// Reads issued per invocation.
    pub reads: u64,
    /// One record per configuration, in matrix order.
    pub results: Vec<ResultRecord>,
}

/// Flat record of one configuration's averages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Database label.
    pub database: String,
    /// Read workload.
    pub read: ReadPattern,
    /// Global index table setup.
    pub variant: GitVariant,
    /// Mean operation count.
    pub op_count: f64,
    /// Mean build time in milliseconds.
    pub build_ms: f64,
    /// Mean search time in milliseconds.
    pub search_ms: f64,
    /// Mean search time per 100,000 operations in milliseconds.
    pub search_ms_per_100k_ops: f64,
}

impl From<&ConfigResult> for ResultRecord {
    fn from(entry: &ConfigResult) -> Self {
        Self {
            database: entry.database.clone(),
            read: entry.read,
            variant: entry.variant,
            op_count: entry.result.op_count,
            build_ms: entry.result.build_ms,
            search_ms: entry.result.search_ms,
            search_ms_per_100k_ops: entry.result.search_ms_per_100k_ops(),
        }
    }
}

impl ResultsFile {
    /// Captures `table` together with the run settings.
    pub fn new(table: &ResultTable, repetitions: usize, reads: u64) -> Self {
        Self {
            repetitions,
            reads,
            results: table.entries().iter().map(ResultRecord::from).collect(),
        }
    }

    /// Rebuilds the table of averages.
    pub fn to_table(&self) -> ResultTable {
        self.results
            .iter()
            .map(|r| ConfigResult {
                database: r.database.clone(),
                read: r.read,
                variant: r.variant,
                result: AggregatedResult {
                    op_count: r.op_count,
                    build_ms: r.build_ms,
                    search_ms: r.search_ms,
                    runs: self.repetitions,
                },
            })
            .collect()
    }

    /// Reads a file written by [`ResultsFile::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| BenchError::ResultsFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|err| BenchError::ResultsFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Writes pretty JSON to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|err| BenchError::ResultsFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

/// Writes one CSV row per configuration.
pub fn write_csv<W: io::Write>(table: &ResultTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for entry in table.entries() {
        csv.serialize(ResultRecord::from(entry))?;
    }
    csv.flush()?;
    Ok(())
}
