//! Diagnostic tracing for the runner process.
//!
//! Two outputs exist and they never mix:
//!
//! - **Diagnostics (here)**: `tracing` events filtered by `RUST_LOG`, written
//!   to stderr and never persisted. `writeLog` Sub-Tasks emit here as well.
//! - **Execution log (`io::log_sink`)**: one tab-delimited record per
//!   executed Sub-Task, written whenever a log path is configured.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber. `RUST_LOG` overrides the `warn` default.
///
/// ```bash
/// RUST_LOG=taskrunner::orchestrator=debug taskrunner run nightly.xml
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // Ignore a second install; the first subscriber stays in place.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact().with_target(true))
        .try_init();
}
