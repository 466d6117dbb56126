//! mittens — warmup sidecar.
//!
//! Sends synthetic traffic to a freshly started target so its caches,
//! JIT, and connection pools are warm before the orchestrator routes real
//! traffic to it, then signals readiness through sentinel files and/or
//! HTTP probe endpoints.
//!
//! # Usage
//!
//! ```text
//! mittens -target-http-port=8080 -http-requests=get:/api/items \
//!         -concurrency=4 -max-duration-seconds=30 \
//!         -file-probe-enabled -server-probe-enabled -exit-after-warmup
//! ```

pub mod cli;
pub mod lifecycle;

pub use cli::{Cli, LogFormat, normalize_args};
pub use lifecycle::{EXIT_CONFIG_ERROR, EXIT_FAILED, EXIT_READY, Lifecycle, Outcome, ProbeServerHandle};

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mittens=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
