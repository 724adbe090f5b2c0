//! Tracing initialization.
//!
//! `RUST_LOG` takes precedence. Otherwise `LOG_LEVEL` picks the level using
//! the names CI jobs already set (`DEBUG`, `INFO`, `WARNING`, `ERROR`,
//! `CRITICAL`). `LOG_FORMAT=json` switches to one JSON object per line for
//! log collectors.

use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::BOOTSTRAP_VARS;

/// Variable selecting the log level.
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
/// Variable selecting the output format.
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";

/// Filter and output format chosen from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Directive passed to [`EnvFilter`].
    pub directive: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

/// Maps a `LOG_LEVEL` value to a tracing filter directive.
///
/// Unknown or missing values fall back to `info`.
pub fn level_directive(name: Option<&str>) -> &'static str {
    match name.map(str::trim) {
        Some("DEBUG") => "debug",
        Some("WARNING") => "warn",
        // tracing has no level above error
        Some("ERROR") | Some("CRITICAL") => "error",
        _ => "info",
    }
}

/// Picks the filter directive and format from `RUST_LOG`, `LOG_LEVEL` and
/// `LOG_FORMAT` values.
pub fn select(
    rust_log: Option<&str>,
    log_level: Option<&str>,
    log_format: Option<&str>,
) -> LogSettings {
    let directive = match rust_log.map(str::trim) {
        Some(filter) if !filter.is_empty() => filter.to_string(),
        _ => level_directive(log_level).to_string(),
    };
    let json = log_format.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"));
    LogSettings { directive, json }
}

fn env_lossy(key: &str) -> Option<String> {
    std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
}

/// Initializes the global subscriber. Safe to call more than once.
pub fn init() {
    let rust_log = env_lossy(EnvFilter::DEFAULT_ENV);
    let log_level = env_lossy(LOG_LEVEL_VAR);
    let settings = select(
        rust_log.as_deref(),
        log_level.as_deref(),
        env_lossy(LOG_FORMAT_VAR).as_deref(),
    );

    // An unparsable RUST_LOG falls back to LOG_LEVEL
    let filter = EnvFilter::try_new(&settings.directive)
        .unwrap_or_else(|_| EnvFilter::new(level_directive(log_level.as_deref())));

    let _ = if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}

/// Logs the variables the bootstrap reads, at debug level.
///
/// Only the bootstrap's own inputs are printed so CI credentials never reach
/// the log. Values that are not valid UTF-8 are shown lossily.
pub fn log_environment() {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    tracing::debug!("Environment Variables");
    for name in BOOTSTRAP_VARS {
        match std::env::var_os(name) {
            Some(value) => tracing::debug!("{}={}", name, value.to_string_lossy()),
            None => tracing::debug!("{} unset", name),
        }
    }
    tracing::debug!("End Environment Variables");
}
