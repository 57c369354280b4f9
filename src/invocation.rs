//! Command lines for the external `db_bench` binary.

use std::path::PathBuf;

use serde::Serialize;

use crate::matrix::{Configuration, DEFAULT_BLOOM_BITS, DEFAULT_READS};

/// Settings shared by every invocation of a matrix run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchParams {
    /// Path of the `db_bench` executable.
    pub binary: PathBuf,
    /// Wrapper used to gain elevated privileges; `None` runs the binary directly.
    pub elevate_with: Option<String>,
    /// Benchmarks run ahead of the read workload, e.g. `stats,`.
    pub benchmark_prefix: String,
    /// Value for `--reads`.
    pub reads: u64,
    /// Bits per key for the filtered variants.
    pub bloom_bits: u32,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("./db_bench"),
            elevate_with: Some("sudo".to_string()),
            benchmark_prefix: "stats,".to_string(),
            reads: DEFAULT_READS,
            bloom_bits: DEFAULT_BLOOM_BITS,
        }
    }
}

/// A fully resolved program and argument vector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Program to execute.
    pub program: String,
    /// Arguments in order.
    pub args: Vec<String>,
}

impl Invocation {
    /// Builds the command that benchmarks `configuration`.
    pub fn for_configuration(params: &BenchParams, configuration: &Configuration<'_>) -> Self {
        let flags = configuration.variant.flags(params.bloom_bits);
        let binary = params.binary.to_string_lossy().into_owned();
        let bench_args = [
            format!(
                "--benchmarks={}{}",
                params.benchmark_prefix, configuration.read
            ),
            format!("--num={}", configuration.database.num_entries),
            format!("--reads={}", params.reads),
            format!("--db={}", configuration.database.path.display()),
            "--use_existing_db=1".to_string(),
            format!("--use_gitable={}", u8::from(flags.use_gitable)),
            format!("--bloom_bits={}", flags.bloom_bits_arg()),
            format!("--use_file_gran_filter={}", u8::from(flags.file_granularity)),
        ];

        match &params.elevate_with {
            Some(wrapper) => Self {
                program: wrapper.clone(),
                args: std::iter::once(binary).chain(bench_args).collect(),
            },
            None => Self {
                program: binary,
                args: bench_args.to_vec(),
            },
        }
    }

    /// Shell-like rendering for logs and dry runs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./,:+@%".contains(c))
    {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
