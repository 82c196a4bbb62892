//! Logging bootstrap.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes structured logging.
///
/// The filter comes from `RUST_LOG` when set; otherwise `info`, or `debug`
/// when `debug` is true. Safe to call once per process; subsequent calls
/// are ignored.
pub fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
