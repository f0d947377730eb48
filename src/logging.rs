//! Tracing setup.
//!
//! Command-line runs log to stderr. While the TUI owns the terminal, logs go
//! to `<data_dir>/kb.log` instead so they do not tear the screen.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Env var holding an `EnvFilter` directive, e.g. `KB_LOG=debug`.
pub const ENV_LOG: &str = "KB_LOG";

pub const LOG_FILE: &str = "kb.log";

/// Where log lines are written.
pub enum LogSink<'a> {
    Stderr,
    File(&'a Path),
}

fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("{}={level},warn", env!("CARGO_CRATE_NAME"))
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the program so buffered file logs are flushed.
pub fn init(verbose: bool, sink: LogSink<'_>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let registry = tracing_subscriber::registry().with(filter);

    match sink {
        LogSink::Stderr => {
            let _ = registry
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .try_init();
            None
        }
        LogSink::File(dir) => {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {}: {e}", dir.display());
                return None;
            }
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init();
            Some(guard)
        }
    }
}
