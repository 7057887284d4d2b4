//! Shared logging utilities for consistent tracing across the orchestrator

use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;

/// Build the default filter directive for a base level
pub fn filter_directive(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    format!("fallback={base_level},shared={base_level},reqwest=warn,hyper=warn")
}

/// Initialize the stdout tracing subscriber.
///
/// `RUST_LOG` takes precedence over the level passed in. Calling this twice
/// is harmless: the second registration is ignored.
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for execution-scoped info logging
#[macro_export]
macro_rules! exec_info {
    ($execution_id:expr, $($arg:tt)*) => {
        tracing::info!(
            execution = %$execution_id,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for execution-scoped warning logging
#[macro_export]
macro_rules! exec_warn {
    ($execution_id:expr, $($arg:tt)*) => {
        tracing::warn!(
            execution = %$execution_id,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for execution-scoped error logging
#[macro_export]
macro_rules! exec_error {
    ($execution_id:expr, $($arg:tt)*) => {
        tracing::error!(
            execution = %$execution_id,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for execution-scoped debug logging
#[macro_export]
macro_rules! exec_debug {
    ($execution_id:expr, $($arg:tt)*) => {
        tracing::debug!(
            execution = %$execution_id,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(details: &str) {
    info!(timestamp = format_timestamp(), "🚀 Starting {}", details);
}

/// Contextual logging helper for error conditions
pub fn log_error(execution_id: &Uuid, context: &str, error: &dyn std::fmt::Display) {
    error!(
        execution = %execution_id,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}
