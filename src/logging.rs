use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigError;

/// Installs the global `tracing` subscriber, writing to stderr so reports on
/// stdout stay clean. `level` is an `EnvFilter` directive such as `info` or
/// `gitable_bench=debug`.
pub fn init_logging(level: &str) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(level).map_err(|e| ConfigError::Invalid {
        field: "log-level",
        reason: e.to_string(),
    })?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| ConfigError::Invalid {
            field: "log-level",
            reason: "logging already initialized".into(),
        })
}
