//! Observability: structured logging and query correlation.
//!
//! Metrics are emitted through the `metrics` facade; without an installed
//! recorder they are no-ops, so embedding applications decide where they go.
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `adapter_calls_total` | counter | `source`, `status` |
//! | `adapter_duration_ms` | histogram | `source`, `operation` |
//! | `dedup_merges_total` | counter | none |
//! | `diversity_demotions_total` | counter | none |
//! | `aggregator_query_duration_ms` | histogram | `operation` |

mod logging;
mod request_context;

pub use logging::{LogFormat, LoggingConfig};
pub use request_context::{
    QueryContext, QueryContextGuard, current_context, current_request_id, enter_query_context,
    scope_query_context,
};

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Installs the global tracing subscriber.
///
/// Logs go to stderr, or to `config.file` when set; stdout is left to
/// command output.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed, the filter
/// does not parse, or the log file cannot be opened.
pub fn init(config: LoggingConfig) -> Result<()> {
    let failed = |operation: &str, cause: String| Error::OperationFailed {
        operation: operation.to_string(),
        cause,
    };

    let filter = EnvFilter::try_new(&config.filter).map_err(|e| {
        failed("logging_init", format!("invalid log filter '{}': {e}", config.filter))
    })?;

    let (writer, ansi) = match &config.file {
        Some(path) => {
            let file = open_log_file(path)
                .map_err(|e| failed("open_log_file", format!("{}: {e}", path.display())))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        },
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| failed("logging_init", e.to_string()))
}

/// Opens `path` for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
