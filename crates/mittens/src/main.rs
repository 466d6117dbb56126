//! mittens binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};

use mittens::{Cli, EXIT_CONFIG_ERROR, Lifecycle, init_tracing};
use mittens_core::{ConfigError, Options};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };
    init_tracing(cli.log_format);

    let options = match cli.resolve_options() {
        Ok(options) => options,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match run(Arc::new(options)).await {
        Ok(code) => ExitCode::from(code),
        Err(e) if e.downcast_ref::<ConfigError>().is_some() => {
            error!(error = %e, "invalid configuration");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
        Err(e) => {
            error!(error = ?e, "mittens failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(options: Arc<Options>) -> anyhow::Result<u8> {
    info!(version = env!("CARGO_PKG_VERSION"), "mittens starting");

    let outcome = Lifecycle::new(options.clone()).run().await?;
    info!(
        state = %outcome.state,
        attempted = outcome.summary.attempted,
        failed = outcome.summary.failed,
        "warmup cycle complete"
    );

    if options.exit_after_warmup {
        let exit_code = outcome.exit_code();
        if let Some(server) = outcome.probe_server {
            server.shutdown().await?;
        }
        return Ok(exit_code);
    }

    // Keep the sidecar and its probes alive until the pod is torn down.
    shutdown_signal().await;
    info!("shutdown signal received");
    if let Some(server) = outcome.probe_server {
        server.shutdown().await?;
    }
    Ok(0)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
