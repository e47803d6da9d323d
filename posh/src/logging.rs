//! Development-time tracing for debugging plan execution.
//!
//! Tick-level diagnostics (`RUST_LOG=posh=debug`) show each tick's outcome;
//! `trace` additionally shows drive arbitration (latch holds, preemptions).
//! Output goes to stderr and is not part of the product output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset. Output: stderr, compact
/// format.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
