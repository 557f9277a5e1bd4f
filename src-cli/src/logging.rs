//! stderr logging for the CLI.
//!
//! Library code logs through both `log` and `tracing`; `log` records are
//! bridged into the tracing subscriber so they share one filter and format.

use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;
use crate::error::CliError;

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init(verbosity: u8, format: LogFormat) -> Result<(), CliError> {
    LogTracer::init().map_err(|e| CliError::Logging(e.to_string()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1);

    let result = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.compact().finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };

    result.map_err(|e| CliError::Logging(e.to_string()))
}
