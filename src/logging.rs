//! Tracing setup for binaries and test harnesses; library call paths never
//! install a subscriber themselves.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a global `fmt` subscriber honoring `RUST_LOG`, once per process.
/// Safe to call from every test file; later calls are no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .try_init();
    });
}
