//! Structured logging schema, field name constants, and subscriber setup.
//!
//! All crates use these constants for consistent structured logging fields so
//! that log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Data may be lost (promotion failed and no cache copy remains) |
//! | WARN  | Recoverable issue, automatic fallback applied (rollback, degraded save) |
//! | INFO  | Lifecycle events (startup, promotion, logout), operation completions |
//! | DEBUG | Decision points, debounce fires, batching policy results |
//! | TRACE | Per-change delivery, high-volume notifications |

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "store", "draft", "client", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "medium", "change_bus", "collection", "relay", "engine"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "add", "remove", "clear", "persist", "promote"
pub const OPERATION: &str = "op";

/// Execution context (tab, worker, overlay) that made a write.
pub const CONTEXT_ID: &str = "context_id";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Draft UUID being edited.
pub const DRAFT_ID: &str = "draft_id";

/// Server-assigned note id.
pub const NOTE_ID: &str = "note_id";

/// KeyedStore key affected.
pub const STORE_KEY: &str = "store_key";

/// Save batch identifier.
pub const BATCH_ID: &str = "batch_id";

/// Draft version sent or received.
pub const VERSION: &str = "version";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of items in a collection after a mutation.
pub const ITEM_COUNT: &str = "item_count";

/// Cache persists since the last durable save.
pub const CHANGE_COUNT: &str = "change_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "synapse=info";

/// Install the global tracing subscriber.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rolling file logging)
///   RUST_LOG    - standard env filter (default: [`DEFAULT_FILTER`])
///
/// The returned guard must be held for the lifetime of the process when file
/// logging is enabled, otherwise buffered lines are dropped.
pub fn init_from_env() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("synapse.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_constant_field_names_reach_json_output() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(
                { CHANGE_COUNT } = 3u32,
                { STORE_KEY } = "collected_pages",
                "Mutation persisted"
            );
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(line["fields"][CHANGE_COUNT], 3);
        assert_eq!(line["fields"][STORE_KEY], "collected_pages");
    }
}
