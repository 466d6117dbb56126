//! HTTP probe endpoints.
//!
//! | Method | Path | Response |
//! |---|---|---|
//! | GET | liveness path (default `/alive`) | 200 always |
//! | GET | readiness path (default `/ready`) | 200 when ready, 503 otherwise |
//!
//! Handlers read a snapshot of the coordinator's state and never wait on
//! warmup progress.

use std::io;
use std::net::SocketAddr;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use mittens_core::Options;

use crate::state::ProbeState;

/// Shared state for probe handlers.
#[derive(Clone)]
pub struct ProbeServerState {
    pub state: watch::Receiver<ProbeState>,
}

#[derive(Serialize)]
struct ProbeResponse {
    status: &'static str,
    state: ProbeState,
}

/// Build the probe router.
pub fn build_router(
    liveness_path: &str,
    readiness_path: &str,
    state: watch::Receiver<ProbeState>,
) -> Router {
    Router::new()
        .route(liveness_path, get(liveness))
        .route(readiness_path, get(readiness))
        .with_state(ProbeServerState { state })
}

/// GET liveness
async fn liveness(State(probe): State<ProbeServerState>) -> impl IntoResponse {
    let state = *probe.state.borrow();
    (
        StatusCode::OK,
        Json(ProbeResponse {
            status: "alive",
            state,
        }),
    )
}

/// GET readiness
async fn readiness(State(probe): State<ProbeServerState>) -> impl IntoResponse {
    let state = *probe.state.borrow();
    if state.is_ready() {
        (
            StatusCode::OK,
            Json(ProbeResponse {
                status: "ready",
                state,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse {
                status: "not ready",
                state,
            }),
        )
    }
}

/// Probe server bound to its own listener, independent of warmup.
pub struct ProbeServer {
    listener: TcpListener,
    router: Router,
}

impl ProbeServer {
    /// Bind on all interfaces. Port 0 picks an ephemeral port.
    pub async fn bind(
        port: u16,
        liveness_path: &str,
        readiness_path: &str,
        state: watch::Receiver<ProbeState>,
    ) -> io::Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            router: build_router(liveness_path, readiness_path, state),
        })
    }

    pub async fn from_options(
        options: &Options,
        state: watch::Receiver<ProbeState>,
    ) -> io::Result<Self> {
        let probe = &options.server_probe;
        Self::bind(probe.port, &probe.liveness_path, &probe.readiness_path, state).await
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires.
    pub async fn serve(self, shutdown: CancellationToken) -> io::Result<()> {
        let addr = self.listener.local_addr()?;
        info!(%addr, "probe server listening");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        info!(%addr, "probe server stopped");
        Ok(())
    }
}
