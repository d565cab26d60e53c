//! Structured logging via the `tracing` ecosystem.
//!
//! The filter comes from `RUST_LOG` when set (a `.env` file is honored), and
//! otherwise from the `--log-level` flag. Logs go to stderr so stdout stays
//! reserved for reports.

use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(level: LogLevel) {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr).with_target(false));

    // Ignore error if subscriber was already set
    let _ = tracing::subscriber::set_global_default(subscriber);
}
