//! Walks the experiment matrix, runs every configuration a fixed number of
//! times and averages the runs.
//!
//! The first failed invocation or unparsable output aborts the whole run.
//! There are no retries and no averages over fewer runs than configured.

use std::time::Instant;

use tracing::{debug, info};

use crate::aggregate::{AggregatedResult, ConfigResult, ResultTable};
use crate::config::ConfigError;
use crate::error::Result;
use crate::executor::{BenchExecutor, ExecLimits};
use crate::invocation::{BenchParams, Invocation};
use crate::matrix::{Configuration, ExperimentMatrix};
use crate::output::{parse_run_output, ResultLocator, RunResult};

/// Repetitions per configuration used by the standard matrix.
pub const DEFAULT_REPETITIONS: usize = 3;

/// Progress notifications emitted while the matrix runs.
#[derive(Debug)]
pub enum DriverEvent<'a> {
    /// A configuration is about to run.
    ConfigStarted {
        /// Zero-based position in the matrix.
        index: usize,
        /// Number of configurations.
        total: usize,
        /// The configuration.
        configuration: &'a Configuration<'a>,
    },
    /// One repetition finished and parsed.
    RunFinished {
        /// The configuration.
        configuration: &'a Configuration<'a>,
        /// Zero-based repetition.
        repetition: usize,
        /// Parsed measurements.
        result: &'a RunResult,
    },
    /// All repetitions of a configuration finished.
    ConfigFinished {
        /// The configuration.
        configuration: &'a Configuration<'a>,
        /// The average.
        result: &'a AggregatedResult,
    },
}

/// Everything a matrix run needs besides the executor.
#[derive(Clone, Debug)]
pub struct DriverOptions {
    /// Shared invocation settings.
    pub params: BenchParams,
    /// Runs per configuration.
    pub repetitions: usize,
    /// Per-invocation bounds.
    pub limits: ExecLimits,
    /// Where the result line lives in the output.
    pub locator: ResultLocator,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            params: BenchParams::default(),
            repetitions: DEFAULT_REPETITIONS,
            limits: ExecLimits::default(),
            locator: ResultLocator::default(),
        }
    }
}

/// Runs an [`ExperimentMatrix`] through a [`BenchExecutor`].
pub struct Driver<E> {
    matrix: ExperimentMatrix,
    options: DriverOptions,
    executor: E,
}

impl<E: BenchExecutor> Driver<E> {
    /// Creates a driver.
    pub fn new(matrix: ExperimentMatrix, options: DriverOptions, executor: E) -> Self {
        Self {
            matrix,
            options,
            executor,
        }
    }

    /// The matrix being run.
    pub fn matrix(&self) -> &ExperimentMatrix {
        &self.matrix
    }

    /// Total invocations a full run performs.
    pub fn planned_invocations(&self) -> usize {
        self.matrix.len() * self.options.repetitions
    }

    /// Runs every configuration and returns the averaged table.
    pub fn run(&self, observer: &mut dyn FnMut(DriverEvent<'_>)) -> Result<ResultTable> {
        let configurations = self.matrix.configurations();
        let total = configurations.len();
        let started = Instant::now();
        info!(
            configurations = total,
            repetitions = self.options.repetitions,
            "bench.matrix.started"
        );

        let table = configurations
            .iter()
            .enumerate()
            .map(|(index, configuration)| -> Result<ConfigResult> {
                observer(DriverEvent::ConfigStarted {
                    index,
                    total,
                    configuration,
                });
                let result = self.run_configuration(configuration, observer)?;
                observer(DriverEvent::ConfigFinished {
                    configuration,
                    result: &result,
                });
                Ok(ConfigResult {
                    database: configuration.database.label.clone(),
                    read: configuration.read,
                    variant: configuration.variant,
                    result,
                })
            })
            .collect::<Result<ResultTable>>()?;

        info!(
            configurations = table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bench.matrix.completed"
        );
        Ok(table)
    }

    /// Runs one configuration `repetitions` times and averages it.
    pub fn run_configuration(
        &self,
        configuration: &Configuration<'_>,
        observer: &mut dyn FnMut(DriverEvent<'_>),
    ) -> Result<AggregatedResult> {
        let invocation = Invocation::for_configuration(&self.options.params, configuration);
        debug!(%configuration, command = %invocation.display(), "bench.config.started");

        let runs = (0..self.options.repetitions)
            .map(|repetition| -> Result<RunResult> {
                let started = Instant::now();
                let stdout = self.executor.execute(&invocation, &self.options.limits)?;
                let result = parse_run_output(&stdout, &self.options.locator)?;
                info!(
                    %configuration,
                    repetition,
                    op_count = result.op_count,
                    build_ms = result.build_ms,
                    search_ms = result.search_ms,
                    wall_ms = started.elapsed().as_millis() as u64,
                    "bench.run.completed"
                );
                observer(DriverEvent::RunFinished {
                    configuration,
                    repetition,
                    result: &result,
                });
                Ok(result)
            })
            .collect::<Result<Vec<_>>>()?;

        let aggregate = AggregatedResult::mean(&runs).ok_or(ConfigError::Invalid {
            field: "repetitions",
            reason: "must be at least 1".to_string(),
        })?;
        info!(
            %configuration,
            build_ms = aggregate.build_ms,
            search_ms_per_100k_ops = aggregate.search_ms_per_100k_ops(),
            "bench.config.completed"
        );
        Ok(aggregate)
    }
}
