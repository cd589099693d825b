//! Logging utilities for gribmanager.
//!
//! Structured `tracing` events for long running operations and for the native
//! handle diagnostics.

use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::diagnostics::HandleStats;
use crate::error::GribError;

/// Initialize the tracing subscriber with the given log level
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(val) => val,
        Err(_) => log_level.to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Log a start message for a significant operation
pub fn log_operation_start(operation: &str, details: Option<&str>) {
    if let Some(details) = details {
        info!(
            operation = operation,
            details = details,
            "Starting operation"
        );
    } else {
        info!(operation = operation, "Starting operation");
    }
}

/// Log the completion of a significant operation
pub fn log_operation_end(operation: &str, start_time: Instant, success: bool) {
    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if success {
        info!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation completed successfully"
        );
    } else {
        warn!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation completed with errors"
        );
    }
}

/// Run `f`, logging its duration under a fresh operation id
pub fn log_timed_operation<F, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let operation_id = generate_operation_id();

    debug!(
        operation = operation,
        operation_id = %operation_id,
        "Starting operation"
    );

    let result = f();

    info!(
        operation = operation,
        operation_id = %operation_id,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Operation completed"
    );

    result
}

/// Log the native handle counters
pub fn log_handle_stats(stats: &HandleStats) {
    debug!(
        messages_created = stats.messages_created,
        messages_released = stats.messages_released,
        key_iterators_created = stats.key_iterators_created,
        key_iterators_released = stats.key_iterators_released,
        indices_created = stats.indices_created,
        indices_released = stats.indices_released,
        files_opened = stats.files_opened,
        files_closed = stats.files_closed,
        "Native handle statistics"
    );
    if stats.live_messages() > 0 || stats.live_indices() > 0 {
        warn!(
            live_messages = stats.live_messages(),
            live_indices = stats.live_indices(),
            "Native handles still alive"
        );
    }
}

/// Log an error with context
pub fn log_error(error: &GribError, context: &str) {
    error!(
        error = %error,
        context = context,
        key_error = error.is_key_error(),
        "Error occurred"
    );
}

/// Generate a unique operation ID
pub fn generate_operation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_generate_operation_id() {
        let id1 = generate_operation_id();
        let id2 = generate_operation_id();

        assert!(!id1.is_empty());
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_log_timed_operation() {
        let result = log_timed_operation("test_operation", || {
            std::thread::sleep(Duration::from_millis(1));
            42
        });

        assert_eq!(result, 42);
    }

    #[test]
    fn test_log_handle_stats_with_live_handles() {
        let stats = HandleStats {
            messages_created: 3,
            messages_released: 1,
            ..HandleStats::default()
        };
        // Only checks that logging does not panic without a subscriber
        log_handle_stats(&stats);
        log_error(&GribError::EmptyIndexKeys, "test");
    }
}
