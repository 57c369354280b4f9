//! Experiment vocabulary: databases, read patterns, git variants and the
//! cross product that the driver walks.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bloom filter width used by the filtered variants of the standard matrix.
pub const DEFAULT_BLOOM_BITS: u32 = 10;

/// Number of point reads issued per invocation in the standard matrix.
pub const DEFAULT_READS: u64 = 3_000_000;

/// A pre-built database the benchmark binary is pointed at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTarget {
    /// Short name used in reports and charts, e.g. `10G`.
    pub label: String,
    /// Directory handed to `--db`.
    pub path: PathBuf,
    /// Total number of entries stored, handed to `--num`.
    pub num_entries: u64,
}

impl DatabaseTarget {
    /// Creates a target from its parts.
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>, num_entries: u64) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            num_entries,
        }
    }
}

/// Read workload selected with `--benchmarks`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPattern {
    /// Uniformly random point reads.
    ReadRandom,
    /// Skewed reads favouring a hot key range.
    ReadHot,
}

impl ReadPattern {
    /// Both patterns in report order.
    pub const ALL: [ReadPattern; 2] = [ReadPattern::ReadRandom, ReadPattern::ReadHot];

    /// The `db_bench` benchmark name.
    pub fn as_str(self) -> &'static str {
        match self {
            ReadPattern::ReadRandom => "readrandom",
            ReadPattern::ReadHot => "readhot",
        }
    }
}

impl fmt::Display for ReadPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReadPattern::ALL
            .into_iter()
            .find(|pattern| pattern.as_str() == s)
            .ok_or_else(|| format!("unknown read pattern '{s}'"))
    }
}

/// How the global index table is configured for one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GitVariant {
    /// Global index table turned off.
    #[serde(rename = "no_gitable")]
    Disabled,
    /// Global index table without any filter.
    #[serde(rename = "git_wo_filter")]
    NoFilter,
    /// Global index table with one Bloom filter per table file.
    #[serde(rename = "git_w_file_filter")]
    FileBloom,
    /// Global index table with one Bloom filter per data block.
    #[serde(rename = "git_w_block_filter")]
    BlockBloom,
}

/// Flag values passed to the benchmark binary for a variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariantFlags {
    /// `--use_gitable`.
    pub use_gitable: bool,
    /// `--bloom_bits`; `None` is sent as the `-1` sentinel.
    pub bloom_bits: Option<u32>,
    /// `--use_file_gran_filter`.
    pub file_granularity: bool,
}

impl VariantFlags {
    /// Value for `--bloom_bits`.
    pub fn bloom_bits_arg(&self) -> i64 {
        self.bloom_bits.map_or(-1, i64::from)
    }
}

impl GitVariant {
    /// All variants in report and legend order.
    pub const ALL: [GitVariant; 4] = [
        GitVariant::Disabled,
        GitVariant::NoFilter,
        GitVariant::FileBloom,
        GitVariant::BlockBloom,
    ];

    /// Name printed in the driver report.
    pub fn label(self) -> &'static str {
        match self {
            GitVariant::Disabled => "no_gitable",
            GitVariant::NoFilter => "git_wo_filter",
            GitVariant::FileBloom => "git_w_file_filter",
            GitVariant::BlockBloom => "git_w_block_filter",
        }
    }

    /// Name shown in chart legends.
    pub fn legend_label(self) -> &'static str {
        match self {
            GitVariant::Disabled => "no_git",
            GitVariant::NoFilter => "git_wo_bf",
            GitVariant::FileBloom => "git_w_file_bf",
            GitVariant::BlockBloom => "git_with_blk_bf",
        }
    }

    /// Flags for this variant when filters use `bloom_bits` bits per key.
    pub fn flags(self, bloom_bits: u32) -> VariantFlags {
        match self {
            GitVariant::Disabled => VariantFlags {
                use_gitable: false,
                bloom_bits: None,
                file_granularity: true,
            },
            GitVariant::NoFilter => VariantFlags {
                use_gitable: true,
                bloom_bits: None,
                file_granularity: true,
            },
            GitVariant::FileBloom => VariantFlags {
                use_gitable: true,
                bloom_bits: Some(bloom_bits),
                file_granularity: true,
            },
            GitVariant::BlockBloom => VariantFlags {
                use_gitable: true,
                bloom_bits: Some(bloom_bits),
                file_granularity: false,
            },
        }
    }
}

impl fmt::Display for GitVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GitVariant {
    type Err = String;

    /// Accepts both the report name and the legend name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GitVariant::ALL
            .into_iter()
            .find(|variant| variant.label() == s || variant.legend_label() == s)
            .ok_or_else(|| format!("unknown git variant '{s}'"))
    }
}

/// One cell of the experiment matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Configuration<'a> {
    /// Database under test.
    pub database: &'a DatabaseTarget,
    /// Read workload.
    pub read: ReadPattern,
    /// Global index table setup.
    pub variant: GitVariant,
}

impl fmt::Display for Configuration<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.database.label, self.read, self.variant)
    }
}

/// The databases, read patterns and variants to cross.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExperimentMatrix {
    /// Databases in report order.
    pub databases: Vec<DatabaseTarget>,
    /// Read patterns in report order.
    pub read_patterns: Vec<ReadPattern>,
    /// Variants in report order.
    pub variants: Vec<GitVariant>,
}

impl ExperimentMatrix {
    /// The 3 × 2 × 4 matrix the global index table was evaluated on.
    pub fn standard() -> Self {
        Self {
            databases: standard_databases(),
            read_patterns: ReadPattern::ALL.to_vec(),
            variants: GitVariant::ALL.to_vec(),
        }
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.databases.len() * self.read_patterns.len() * self.variants.len()
    }

    /// True when any dimension is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configurations ordered database, then read pattern, then variant.
    pub fn configurations(&self) -> Vec<Configuration<'_>> {
        self.databases
            .iter()
            .flat_map(|database| {
                self.read_patterns.iter().flat_map(move |&read| {
                    self.variants.iter().map(move |&variant| Configuration {
                        database,
                        read,
                        variant,
                    })
                })
            })
            .collect()
    }
}

impl Default for ExperimentMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

/// The 10G, 50G and 100G databases.
pub fn standard_databases() -> Vec<DatabaseTarget> {
    vec![
        DatabaseTarget::new("10G", "/data/gitable/test_data_10G", 90_400_000),
        DatabaseTarget::new("50G", "/data/gitable/test_data_50G", 452_000_000),
        DatabaseTarget::new("100G", "/data/gitable/test_data_100G", 904_000_000),
    ]
}
