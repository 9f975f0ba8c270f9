//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset: coordination decisions at info,
/// everything else at warn.
pub const DEFAULT_LOG_FILTER: &str = "warn,calendar_sync=info";

/// Install an env-filtered fmt subscriber unless the embedder already set one.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`]; lock and drain decisions are
/// logged under the `calendar_sync::core` targets, so
/// `RUST_LOG=calendar_sync::core::drain=debug` follows a single drain.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
