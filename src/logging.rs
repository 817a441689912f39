//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize a `tracing` subscriber with `RUST_LOG` support, defaulting
/// to `info`. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
