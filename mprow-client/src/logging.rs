//! Diagnostic log sink
//!
//! The `debug` configuration flag installs a tracing-subscriber fmt sink
//! filtered to this crate family at debug level, unless `RUST_LOG` already
//! says otherwise. Installation is idempotent; if the host application has
//! its own subscriber, that one wins and this is a no-op.

use tracing_subscriber::EnvFilter;

/// Install the diagnostic log sink. Safe to call more than once.
pub fn init_debug_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mprow=debug,mprow_client=debug,mprow_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
