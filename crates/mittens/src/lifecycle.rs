//! One warmup cycle from startup to a terminal probe state.
//!
//! ```text
//! parse requests
//!   → bind probe server            (if enabled)
//!   → clear stale ready, write alive (if enabled)
//!   → Starting → Warming
//!   → deadline timer
//!   → health poll / warmup per mode
//!   → Warming → Ready | Failed
//!   → wait for the file probe to publish
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mittens_core::{HealthCheckMode, Options};
use mittens_health::{HealthOutcome, TargetHealthChecker};
use mittens_probe::{FileProbeWriter, ProbeServer, ProbeState, ReadinessCoordinator};
use mittens_warmup::{TargetClient, WarmupEngine, WarmupSummary};

pub const EXIT_READY: u8 = 0;
pub const EXIT_FAILED: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Running probe server; keeps answering after the cycle ends.
pub struct ProbeServerHandle {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl ProbeServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting probes and wait for the server to drain.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        self.task
            .await
            .context("probe server task panicked")?
            .context("probe server failed")
    }
}

/// What a finished cycle produced.
pub struct Outcome {
    pub state: ProbeState,
    pub summary: WarmupSummary,
    /// `None` when the health check is disabled.
    pub health: Option<HealthOutcome>,
    pub probe_server: Option<ProbeServerHandle>,
}

impl Outcome {
    /// Process exit code when exiting after warmup.
    pub fn exit_code(&self) -> u8 {
        if self.state.is_ready() {
            EXIT_READY
        } else {
            EXIT_FAILED
        }
    }
}

pub struct Lifecycle {
    options: Arc<Options>,
}

impl Lifecycle {
    pub fn new(options: Arc<Options>) -> Self {
        Self { options }
    }

    pub async fn run(&self) -> anyhow::Result<Outcome> {
        let options = self.options.as_ref();

        let specs = options.request_specs()?;
        let client = Arc::new(TargetClient::from_options(options)?);
        let checker = match options.health_check {
            HealthCheckMode::Disabled => None,
            _ => Some(TargetHealthChecker::from_options(options)?),
        };
        let engine = WarmupEngine::from_options(client, options);
        let coordinator = ReadinessCoordinator::new(options.fail_readiness);

        // ── Probes ─────────────────────────────────────────────

        let probe_server = if options.server_probe.enabled {
            let server = ProbeServer::from_options(options, coordinator.subscribe())
                .await
                .with_context(|| {
                    format!("binding probe server on port {}", options.server_probe.port)
                })?;
            let addr = server.local_addr()?;
            let shutdown = CancellationToken::new();
            let task = tokio::spawn(server.serve(shutdown.clone()));
            Some(ProbeServerHandle {
                addr,
                shutdown,
                task,
            })
        } else {
            None
        };

        let file_observer = if options.file_probe.enabled {
            let writer = FileProbeWriter::from_options(options);
            writer.prepare().await.with_context(|| {
                format!("removing stale {}", writer.ready_path().display())
            })?;
            writer.write_alive().await.with_context(|| {
                format!("writing {}", writer.alive_path().display())
            })?;
            Some(tokio::spawn(writer.observe(coordinator.subscribe())))
        } else {
            None
        };

        coordinator.begin_warmup()?;

        // ── Warmup ─────────────────────────────────────────────

        let deadline = CancellationToken::new();
        let timer = {
            let deadline = deadline.clone();
            let max_duration = options.max_duration();
            tokio::spawn(async move {
                tokio::time::sleep(max_duration).await;
                debug!(seconds = max_duration.as_secs(), "warmup deadline reached");
                deadline.cancel();
            })
        };

        info!(
            requests = specs.len(),
            concurrency = options.concurrency,
            max_duration_seconds = options.max_duration_seconds,
            health_check = %options.health_check,
            "warmup cycle started"
        );

        let (health, summary) = match (options.health_check, checker) {
            (HealthCheckMode::Sequential, Some(checker)) => {
                let health = checker.poll(&deadline).await;
                let summary = if health.healthy {
                    engine.run(specs, &deadline).await
                } else {
                    warn!(
                        endpoint = %checker.endpoint(),
                        attempts = health.attempts,
                        "target never became healthy, skipping warmup"
                    );
                    WarmupSummary::default()
                };
                (Some(health), summary)
            }
            (HealthCheckMode::Parallel, Some(checker)) => {
                let (health, summary) =
                    tokio::join!(checker.poll(&deadline), engine.run(specs, &deadline));
                (Some(health), summary)
            }
            _ => (None, engine.run(specs, &deadline).await),
        };
        timer.abort();

        let state = coordinator.conclude(&summary, health.as_ref())?;

        if let Some(observer) = file_observer {
            observer
                .await
                .context("file probe task panicked")?
                .context("publishing file probe")?;
        }

        Ok(Outcome {
            state,
            summary,
            health,
            probe_server,
        })
    }
}
