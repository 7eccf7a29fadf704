use std::io::{self, IsTerminal};
use tracing_subscriber::{EnvFilter, fmt};

/// Install a JSON subscriber filtered by `RUST_LOG` (default "info").
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .json()
        .flatten_event(true)
        .try_init();
}

/// Human-readable variant of [`init_logging`].
pub fn init_pretty_logging() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_ansi(io::stdout().is_terminal())
        .try_init();
}

/// Pretty output on a terminal, JSON everywhere else.
pub fn default_log_mode() -> LogMode {
    if io::stdout().is_terminal() {
        LogMode::Pretty
    } else {
        LogMode::Json
    }
}

pub fn init(mode: LogMode) {
    match mode {
        LogMode::Json => init_logging(),
        LogMode::Pretty => init_pretty_logging(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Json,
    Pretty,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
