//! TOML configuration for matrix runs.
//!
//! A missing file means the standard matrix with its default settings.
//! Every key is optional; absent keys keep their defaults.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::{DriverOptions, DEFAULT_REPETITIONS};
use crate::executor::ExecLimits;
use crate::invocation::BenchParams;
use crate::matrix::{
    standard_databases, DatabaseTarget, ExperimentMatrix, GitVariant, ReadPattern,
    DEFAULT_BLOOM_BITS, DEFAULT_READS,
};
use crate::output::ResultLocator;

/// Errors raised while loading, validating or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// Serialization to TOML failed.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying error.
        source: toml::ser::Error,
    },
    /// Writing the file failed.
    #[error("failed to write config {path}: {source}")]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Creating the parent directory failed.
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Refused to overwrite an existing file.
    #[error("config {path} already exists; pass --force to overwrite")]
    Exists {
        /// File path.
        path: PathBuf,
    },
    /// A value is out of range or inconsistent.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// Neither `--config` nor a platform config directory is available.
    #[error("no config directory found; pass --config or set GITBENCH_CONFIG")]
    NoConfigPath,
}

/// Validated configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchConfig {
    /// File the configuration came from, or would be written to.
    pub path: Option<PathBuf>,
    /// Databases, read patterns and variants to cross.
    pub matrix: ExperimentMatrix,
    /// Shared invocation settings.
    pub params: BenchParams,
    /// Runs per configuration.
    pub repetitions: usize,
    /// Per-invocation time limit; `None` waits forever.
    pub timeout: Option<Duration>,
    /// First field of the result line, when `db_bench` tags it.
    pub result_tag: Option<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            path: None,
            matrix: ExperimentMatrix::standard(),
            params: BenchParams::default(),
            repetitions: DEFAULT_REPETITIONS,
            timeout: None,
            result_tag: None,
        }
    }
}

impl BenchConfig {
    /// Loads `explicit`, or the default location, falling back to defaults
    /// when the file does not exist.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let raw = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        let mut config = Self::try_from(raw)?;
        config.path = path;
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        let mut config = Self::try_from(raw)?;
        config.path = Some(origin.to_path_buf());
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&RawConfig::from(self))
            .map_err(|source| ConfigError::Serialize { source })
    }

    /// Writes the configuration to its path, refusing to clobber unless `force`.
    pub fn persist(&self, force: bool) -> Result<PathBuf, ConfigError> {
        let target = self
            .path
            .clone()
            .or_else(default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;
        if target.exists() && !force {
            return Err(ConfigError::Exists { path: target });
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&target, self.to_toml()?).map_err(|source| ConfigError::Write {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }

    /// Options for [`crate::driver::Driver`].
    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            params: self.params.clone(),
            repetitions: self.repetitions,
            limits: ExecLimits {
                timeout: self.timeout,
                cancel: None,
            },
            locator: self
                .result_tag
                .clone()
                .map_or(ResultLocator::LastLine, ResultLocator::Tagged),
        }
    }

    /// Checks the invariants the driver relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        if self.repetitions == 0 {
            return invalid("bench.repetitions", "must be at least 1");
        }
        if self.params.reads == 0 {
            return invalid("bench.reads", "must be at least 1");
        }
        if self.params.binary.as_os_str().is_empty() {
            return invalid("bench.binary", "must not be empty");
        }
        if self.timeout == Some(Duration::ZERO) {
            return invalid("bench.timeout_secs", "must be positive when set");
        }
        if self.matrix.databases.is_empty() {
            return invalid("databases", "at least one database is required");
        }
        if self.matrix.read_patterns.is_empty() {
            return invalid("matrix.read_patterns", "must not be empty");
        }
        if self.matrix.variants.is_empty() {
            return invalid("matrix.variants", "must not be empty");
        }
        let mut labels = HashSet::new();
        for db in &self.matrix.databases {
            if db.num_entries == 0 {
                return Err(ConfigError::Invalid {
                    field: "databases.num_entries",
                    reason: format!("database {} has no entries", db.label),
                });
            }
            if !labels.insert(db.label.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "databases.label",
                    reason: format!("duplicate label {}", db.label),
                });
            }
        }
        Ok(())
    }
}

impl TryFrom<RawConfig> for BenchConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let bench = raw.bench;
        let config = Self {
            path: None,
            matrix: ExperimentMatrix {
                databases: raw.databases,
                read_patterns: raw.matrix.read_patterns,
                variants: raw.matrix.variants,
            },
            params: BenchParams {
                binary: bench.binary,
                elevate_with: bench
                    .elevate
                    .then_some(bench.elevate_with)
                    .filter(|wrapper| !wrapper.is_empty()),
                benchmark_prefix: bench.benchmark_prefix,
                reads: bench.reads,
                bloom_bits: bench.bloom_bits,
            },
            repetitions: bench.repetitions,
            timeout: bench.timeout_secs.map(Duration::from_secs),
            result_tag: bench.result_tag.filter(|tag| !tag.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<&BenchConfig> for RawConfig {
    fn from(config: &BenchConfig) -> Self {
        Self {
            bench: RawBench {
                binary: config.params.binary.clone(),
                elevate: config.params.elevate_with.is_some(),
                elevate_with: config
                    .params
                    .elevate_with
                    .clone()
                    .unwrap_or_else(default_elevate_with),
                benchmark_prefix: config.params.benchmark_prefix.clone(),
                reads: config.params.reads,
                bloom_bits: config.params.bloom_bits,
                repetitions: config.repetitions,
                timeout_secs: config.timeout.map(|t| t.as_secs()),
                result_tag: config.result_tag.clone(),
            },
            matrix: RawMatrix {
                read_patterns: config.matrix.read_patterns.clone(),
                variants: config.matrix.variants.clone(),
            },
            databases: config.matrix.databases.clone(),
        }
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    bench: RawBench,
    matrix: RawMatrix,
    databases: Vec<DatabaseTarget>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            bench: RawBench::default(),
            matrix: RawMatrix::default(),
            databases: standard_databases(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
struct RawBench {
    binary: PathBuf,
    elevate: bool,
    elevate_with: String,
    benchmark_prefix: String,
    reads: u64,
    bloom_bits: u32,
    repetitions: usize,
    timeout_secs: Option<u64>,
    result_tag: Option<String>,
}

impl Default for RawBench {
    fn default() -> Self {
        let params = BenchParams::default();
        Self {
            binary: params.binary,
            elevate: params.elevate_with.is_some(),
            elevate_with: params.elevate_with.unwrap_or_else(default_elevate_with),
            benchmark_prefix: params.benchmark_prefix,
            reads: DEFAULT_READS,
            bloom_bits: DEFAULT_BLOOM_BITS,
            repetitions: DEFAULT_REPETITIONS,
            timeout_secs: None,
            result_tag: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
struct RawMatrix {
    read_patterns: Vec<ReadPattern>,
    variants: Vec<GitVariant>,
}

impl Default for RawMatrix {
    fn default() -> Self {
        Self {
            read_patterns: ReadPattern::ALL.to_vec(),
            variants: GitVariant::ALL.to_vec(),
        }
    }
}

fn default_elevate_with() -> String {
    "sudo".to_string()
}

/// `<config dir>/gitable-bench/bench.toml`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("gitable-bench").join("bench.toml"))
}
