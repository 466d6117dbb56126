//! Target health poller.
//!
//! Polls the target's readiness endpoint until it answers 2xx or the
//! shared cancellation token fires.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mittens_core::{ConfigResult, Options};

use crate::checker::{Backoff, ProbeError, http_probe};

/// Result of a polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthOutcome {
    pub healthy: bool,
    pub attempts: u32,
    /// Last failure seen; `None` when healthy on the first attempt or never polled.
    pub last_error: Option<ProbeError>,
    pub elapsed: Duration,
}

/// Polls one readiness endpoint with exponential backoff.
#[derive(Debug, Clone)]
pub struct TargetHealthChecker {
    address: String,
    path: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl TargetHealthChecker {
    pub fn new(address: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            path: path.into(),
            headers: Vec::new(),
            timeout: Duration::from_secs(2),
            backoff_base: Duration::from_millis(250),
            backoff_max: Duration::from_secs(2),
        }
    }

    /// Build a checker for the readiness endpoint described by `options`.
    pub fn from_options(options: &Options) -> ConfigResult<Self> {
        let target = &options.target;
        Ok(Self::new(target.readiness_address(), &target.readiness_http_path)
            .with_headers(options.http.header_pairs()?)
            .with_timeout(Duration::from_millis(target.readiness_timeout_milliseconds))
            .with_backoff(
                Duration::from_millis(target.readiness_backoff_milliseconds),
                Duration::from_millis(target.readiness_max_backoff_milliseconds),
            ))
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}{}", self.address, self.path)
    }

    /// Poll until healthy or until `cancel` fires.
    ///
    /// The first attempt is issued immediately. An attempt in flight when
    /// the token fires is dropped rather than awaited.
    pub async fn poll(&self, cancel: &CancellationToken) -> HealthOutcome {
        let started = Instant::now();
        let mut backoff = Backoff::new(self.backoff_base, self.backoff_max);
        let mut attempts = 0;
        let mut last_error = None;

        debug!(endpoint = %self.endpoint(), "waiting for target readiness");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            attempts += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = http_probe(&self.address, &self.path, &self.headers, self.timeout) => result,
            };

            match result {
                Ok(status) => {
                    info!(
                        endpoint = %self.endpoint(),
                        status,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "target is ready"
                    );
                    return HealthOutcome {
                        healthy: true,
                        attempts,
                        last_error,
                        elapsed: started.elapsed(),
                    };
                }
                Err(e) => {
                    debug!(attempt = attempts, error = %e, "target not ready yet");
                    last_error = Some(e);
                }
            }

            let delay = backoff.fail();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        warn!(
            endpoint = %self.endpoint(),
            attempts,
            error = %last_error.as_ref().map(ToString::to_string).unwrap_or_default(),
            "target did not become ready before the deadline"
        );
        HealthOutcome {
            healthy: false,
            attempts,
            last_error,
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn healthy_on_first_attempt() {
        let addr = serve(Router::new().route("/health", get(|| async { "ok" }))).await;
        let checker = TargetHealthChecker::new(addr, "/health");

        let outcome = checker.poll(&CancellationToken::new()).await;
        assert!(outcome.healthy);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.last_error.is_none());
    }

    #[tokio::test]
    async fn retries_until_healthy() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/health",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        StatusCode::SERVICE_UNAVAILABLE
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        );
        let addr = serve(app).await;
        let checker = TargetHealthChecker::new(addr, "/health")
            .with_backoff(Duration::from_millis(10), Duration::from_millis(20));

        let outcome = checker.poll(&CancellationToken::new()).await;
        assert!(outcome.healthy);
        assert_eq!(outcome.attempts, 3);
        assert!(matches!(
            outcome.last_error,
            Some(ProbeError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn gives_up_when_cancelled() {
        let checker = TargetHealthChecker::new("127.0.0.1:1", "/health")
            .with_backoff(Duration::from_millis(10), Duration::from_millis(50));
        let cancel = CancellationToken::new();

        let deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            deadline.cancel();
        });

        let started = Instant::now();
        let outcome = checker.poll(&cancel).await;
        assert!(!outcome.healthy);
        assert!(outcome.attempts >= 1);
        assert!(matches!(outcome.last_error, Some(ProbeError::Connect { .. })));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn already_cancelled_never_polls() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = TargetHealthChecker::new("127.0.0.1:1", "/health")
            .poll(&cancel)
            .await;
        assert!(!outcome.healthy);
        assert_eq!(outcome.attempts, 0);
    }

    #[test]
    fn from_options_uses_readiness_port() {
        let options = mittens_core::OptionsLayer {
            target: mittens_core::options::TargetLayer {
                http_port: Some(1111),
                readiness_port: Some(8080),
                readiness_http_path: Some("/health".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
        .resolve()
        .unwrap();

        let checker = TargetHealthChecker::from_options(&options).unwrap();
        assert_eq!(checker.endpoint(), "http://localhost:8080/health");
    }
}
