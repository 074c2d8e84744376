//! Structured logging initialization.
//!
//! An `EnvFilter` driven by `RUST_LOG` (defaulting to `info`), installed once at process start
//! before anything else runs.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global `tracing` subscriber reading its filter from `RUST_LOG`, falling back to
/// `info` for this crate and `warn` for dependencies when unset.
///
/// Safe to call at most once per process; a second call is a logic error in the caller; tests
/// should use `tracing_subscriber::fmt().with_test_writer()` locally instead of calling this.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,relayq_core=info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
