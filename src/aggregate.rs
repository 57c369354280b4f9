//! Averaging repeated runs and the immutable table of averages.

use serde::{Deserialize, Serialize};

use crate::matrix::{GitVariant, ReadPattern};
use crate::output::RunResult;

/// Search times are reported per this many operations.
pub const OPS_NORMALIZATION: f64 = 100_000.0;

/// Element-wise mean of the runs of one configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Mean operation count.
    pub op_count: f64,
    /// Mean build time in milliseconds.
    pub build_ms: f64,
    /// Mean total search time in milliseconds.
    pub search_ms: f64,
    /// Number of runs averaged.
    pub runs: usize,
}

impl AggregatedResult {
    /// Sums `runs` field by field and divides by their count.
    /// Returns `None` when there is nothing to average.
    pub fn mean(runs: &[RunResult]) -> Option<Self> {
        if runs.is_empty() {
            return None;
        }
        let sum = runs.iter().fold(RunResult::default(), |acc, run| RunResult {
            op_count: acc.op_count + run.op_count,
            build_ms: acc.build_ms + run.build_ms,
            search_ms: acc.search_ms + run.search_ms,
        });
        let n = runs.len() as f64;
        Some(Self {
            op_count: sum.op_count / n,
            build_ms: sum.build_ms / n,
            search_ms: sum.search_ms / n,
            runs: runs.len(),
        })
    }

    /// Search time per 100,000 operations, in milliseconds.
    pub fn search_ms_per_100k_ops(&self) -> f64 {
        (self.search_ms / self.op_count) * OPS_NORMALIZATION
    }
}

/// Averaged result of one configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigResult {
    /// Database label.
    pub database: String,
    /// Read workload.
    pub read: ReadPattern,
    /// Global index table setup.
    pub variant: GitVariant,
    /// The averaged measurements.
    pub result: AggregatedResult,
}

/// All averaged results of a matrix run, in matrix order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultTable {
    entries: Vec<ConfigResult>,
}

impl ResultTable {
    /// Wraps entries already in matrix order.
    pub fn new(entries: Vec<ConfigResult>) -> Self {
        Self { entries }
    }

    /// Entries in matrix order.
    pub fn entries(&self) -> &[ConfigResult] {
        &self.entries
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no configuration was run.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the result of one configuration.
    pub fn get(
        &self,
        database: &str,
        read: ReadPattern,
        variant: GitVariant,
    ) -> Option<&AggregatedResult> {
        self.entries
            .iter()
            .find(|e| e.database == database && e.read == read && e.variant == variant)
            .map(|e| &e.result)
    }
}

impl FromIterator<ConfigResult> for ResultTable {
    fn from_iter<I: IntoIterator<Item = ConfigResult>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
