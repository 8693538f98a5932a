//! Diagnostic logging to stderr.
//!
//! Filtered by `HANDY_LOG` (same syntax as `RUST_LOG`), defaulting to `warn`
//! so normal command output stays clean.

use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "HANDY_LOG";
const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
///
/// Calling it twice is harmless: the second subscriber is dropped.
#[must_use = "dropping the guard stops log output"]
pub fn init() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    let installed = fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("logging already initialized");
    }
    guard
}
