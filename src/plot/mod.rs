//! Grouped bar charts of build and search times.
//!
//! [`PlotDataset::captured`] holds the numbers measured on the 10G, 50G and
//! 100G databases. A dataset can also be built from a results file written
//! by a matrix run.

mod render;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{BenchError, Result};
use crate::matrix::{GitVariant, ReadPattern};
use crate::report::ResultsFile;

pub use render::{render_chart, BAR_WIDTH};

/// Which measurement a chart shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingDimension {
    /// Global index table build time.
    Build,
    /// Search time per 100,000 operations.
    Search,
}

impl TimingDimension {
    /// Name used in chart titles.
    pub fn title(self) -> &'static str {
        match self {
            TimingDimension::Build => "build time",
            TimingDimension::Search => "search time",
        }
    }

    /// Y axis description.
    pub fn axis_label(self) -> &'static str {
        match self {
            TimingDimension::Build => "build time (ms)",
            TimingDimension::Search => "search time per 100000 ops (ms)",
        }
    }
}

impl fmt::Display for TimingDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimingDimension::Build => "build",
            TimingDimension::Search => "search",
        })
    }
}

impl FromStr for TimingDimension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "build" | "build time" => Ok(TimingDimension::Build),
            "search" | "search time" => Ok(TimingDimension::Search),
            other => Err(format!("unknown timing dimension '{other}'")),
        }
    }
}

/// Build and normalized search time of one configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Timings {
    /// Build time in milliseconds.
    pub build_ms: f64,
    /// Search time per 100,000 operations in milliseconds.
    pub search_ms_per_100k_ops: f64,
}

impl Timings {
    /// The value for `dimension`.
    pub fn get(&self, dimension: TimingDimension) -> f64 {
        match dimension {
            TimingDimension::Build => self.build_ms,
            TimingDimension::Search => self.search_ms_per_100k_ops,
        }
    }
}

/// Composite key of a dataset cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlotKey {
    /// Read workload.
    pub read: ReadPattern,
    /// Database label.
    pub database: String,
    /// Global index table setup.
    pub variant: GitVariant,
}

/// One bar colour: a variant's values across the database groups.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    /// Variant the bars belong to.
    pub variant: GitVariant,
    /// Legend text.
    pub label: &'static str,
    /// One value per database group.
    pub values: Vec<f64>,
}

/// Read-only table of timings keyed by read pattern, database and variant.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotDataset {
    databases: Vec<String>,
    variants: Vec<GitVariant>,
    cells: HashMap<PlotKey, Timings>,
}

impl PlotDataset {
    /// Results captured on the 10G, 50G and 100G databases.
    pub fn captured() -> Self {
        use GitVariant::{BlockBloom, Disabled, FileBloom, NoFilter};
        use ReadPattern::{ReadHot, ReadRandom};

        const ROWS: [(ReadPattern, &str, [(GitVariant, f64, f64); 4]); 6] = [
            (
                ReadRandom,
                "10G",
                [
                    (Disabled, 0.0, 805.27),
                    (NoFilter, 7.94, 642.57),
                    (FileBloom, 8.87, 640.27),
                    (BlockBloom, 8.87, 639.93),
                ],
            ),
            (
                ReadRandom,
                "50G",
                [
                    (Disabled, 0.0, 5933.1),
                    (NoFilter, 31218.5, 4734.61),
                    (FileBloom, 31509.13, 1959.89),
                    (BlockBloom, 31443.63, 1957.69),
                ],
            ),
            (
                ReadRandom,
                "100G",
                [
                    (Disabled, 0.0, 8030.8),
                    (NoFilter, 112077.33, 5998.72),
                    (FileBloom, 113007.0, 2210.26),
                    (BlockBloom, 112356.0, 2228.23),
                ],
            ),
            (
                ReadHot,
                "10G",
                [
                    (Disabled, 0.0, 752.72),
                    (NoFilter, 8.75, 554.49),
                    (FileBloom, 8.04, 555.96),
                    (BlockBloom, 8.00, 553.26),
                ],
            ),
            (
                ReadHot,
                "50G",
                [
                    (Disabled, 0.0, 3617.10),
                    (NoFilter, 31216.30, 2816.18),
                    (FileBloom, 31540.8, 1340.37),
                    (BlockBloom, 31534.07, 1340.71),
                ],
            ),
            (
                ReadHot,
                "100G",
                [
                    (Disabled, 0.0, 4558.41),
                    (NoFilter, 111582.0, 3616.56),
                    (FileBloom, 112209.33, 1573.45),
                    (BlockBloom, 112213.0, 1569.44),
                ],
            ),
        ];

        let cells = ROWS
            .iter()
            .flat_map(|(read, database, cells)| {
                cells.iter().map(move |&(variant, build_ms, search)| {
                    (
                        PlotKey {
                            read: *read,
                            database: (*database).to_string(),
                            variant,
                        },
                        Timings {
                            build_ms,
                            search_ms_per_100k_ops: search,
                        },
                    )
                })
            })
            .collect();

        Self {
            databases: vec!["10G".into(), "50G".into(), "100G".into()],
            variants: GitVariant::ALL.to_vec(),
            cells,
        }
    }

    /// Dataset from a finished matrix run. Databases and variants keep the
    /// order in which they first appear in the file.
    pub fn from_results(file: &ResultsFile) -> Self {
        let mut databases: Vec<String> = Vec::new();
        let mut variants: Vec<GitVariant> = Vec::new();
        let mut cells = HashMap::new();
        for record in &file.results {
            if !databases.contains(&record.database) {
                databases.push(record.database.clone());
            }
            if !variants.contains(&record.variant) {
                variants.push(record.variant);
            }
            cells.insert(
                PlotKey {
                    read: record.read,
                    database: record.database.clone(),
                    variant: record.variant,
                },
                Timings {
                    build_ms: record.build_ms,
                    search_ms_per_100k_ops: record.search_ms_per_100k_ops,
                },
            );
        }
        Self {
            databases,
            variants,
            cells,
        }
    }

    /// Database labels, i.e. the x axis groups.
    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    /// Variants in legend order.
    pub fn variants(&self) -> &[GitVariant] {
        &self.variants
    }

    /// Looks up one cell.
    pub fn get(&self, read: ReadPattern, database: &str, variant: GitVariant) -> Option<Timings> {
        self.cells
            .get(&PlotKey {
                read,
                database: database.to_string(),
                variant,
            })
            .copied()
    }

    /// One series per variant, each with one value per database.
    pub fn series(&self, read: ReadPattern, dimension: TimingDimension) -> Result<Vec<Series>> {
        self.variants
            .iter()
            .map(|&variant| {
                let values = self
                    .databases
                    .iter()
                    .map(|database| {
                        self.get(read, database, variant)
                            .map(|t| t.get(dimension))
                            .ok_or_else(|| BenchError::MissingPlotEntry {
                                read: read.to_string(),
                                database: database.clone(),
                                variant: variant.to_string(),
                            })
                    })
                    .collect::<Result<Vec<f64>>>()?;
                Ok(Series {
                    variant,
                    label: variant.legend_label(),
                    values,
                })
            })
            .collect()
    }
}

/// Title and axis text of a chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChartSpec {
    /// Read workload shown.
    pub read: ReadPattern,
    /// Measurement shown.
    pub dimension: TimingDimension,
}

impl ChartSpec {
    /// Chart caption.
    pub fn title(&self) -> String {
        format!(
            "Global Index Table(git) {} in {}",
            self.dimension.title(),
            self.read
        )
    }

    /// X axis description.
    pub fn x_label(&self) -> &'static str {
        "Database"
    }

    /// Y axis description.
    pub fn y_label(&self) -> &'static str {
        self.dimension.axis_label()
    }

    /// File name used when no output path is given.
    pub fn default_file_name(&self) -> String {
        format!("git_{}_{}.svg", self.dimension, self.read)
    }
}
