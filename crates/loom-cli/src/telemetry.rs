//! Tracing subscriber setup for the `loom` binary.
//!
//! Events go to stderr so command output on stdout stays machine-readable.

use std::io::{self, IsTerminal};

use loom_config::Config;
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

static INSTALLED: OnceCell<()> = OnceCell::new();

#[derive(Debug, thiserror::Error)]
pub(crate) enum TelemetryError {
    #[error("invalid log filter '{expression}': {message}")]
    Filter { expression: String, message: String },
    #[error("could not install the log subscriber: {0}")]
    Install(#[source] TryInitError),
}

/// Installs the process-wide subscriber. Only the first call does any work.
pub(crate) fn initialise(config: &Config) -> Result<(), TelemetryError> {
    INSTALLED.get_or_try_init(|| install(config)).map(|_| ())
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
            expression: config.log_filter().to_owned(),
            message: error.to_string(),
        })?;

    let events = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339())
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.log_format().is_json() {
        registry.with(events.json().flatten_event(true)).try_init()
    } else {
        registry.with(events.compact()).try_init()
    };
    installed.map_err(TelemetryError::Install)
}
