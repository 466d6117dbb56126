//! Warmup engine: bounded pool of workers under a shared deadline.
//!
//! ```text
//! run(specs, deadline)
//!   ├── RequestSource (cyclic or single pass)
//!   ├── `concurrency` workers, each: next spec → client.send → record
//!   ├── deadline fires → workers stop taking new specs
//!   └── grace elapses → in-flight requests abandoned
//! ```
//!
//! The deadline token is the only stop signal; workers never read the
//! clock to decide whether to continue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mittens_core::{Options, RequestSpec};

use crate::client::{ProtocolClient, RequestError};
use crate::source::RequestSource;
use crate::summary::{SummaryRecorder, WarmupResult, WarmupSummary};

/// How long abandoned workers get to record their result before being aborted.
const ABANDON_WAIT: Duration = Duration::from_millis(250);

/// Minimum pause after a refused connection, so a down target is not spun on.
const CONNECT_RETRY_PAUSE: Duration = Duration::from_millis(50);

/// Dispatches warmup requests against the target.
pub struct WarmupEngine {
    client: Arc<dyn ProtocolClient>,
    concurrency: usize,
    grace: Duration,
    request_delay: Duration,
    single_pass: bool,
}

impl WarmupEngine {
    pub fn new(client: Arc<dyn ProtocolClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            grace: Duration::from_secs(1),
            request_delay: Duration::ZERO,
            single_pass: false,
        }
    }

    pub fn from_options(client: Arc<dyn ProtocolClient>, options: &Options) -> Self {
        Self::new(client, options.concurrency)
            .with_grace(options.grace_period())
            .with_request_delay(options.request_delay())
            .with_single_pass(options.single_pass)
    }

    /// Time in-flight requests may keep running after the deadline.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Pause each worker takes between two requests.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Stop after every spec has been attempted once instead of cycling.
    pub fn with_single_pass(mut self, single_pass: bool) -> Self {
        self.single_pass = single_pass;
        self
    }

    /// Run warmup until the source drains or `deadline` fires.
    ///
    /// Returns no later than roughly `deadline + grace`, however slow the
    /// target is.
    pub async fn run(&self, specs: Vec<RequestSpec>, deadline: &CancellationToken) -> WarmupSummary {
        let started = Instant::now();
        let recorder = Arc::new(SummaryRecorder::new());

        if specs.is_empty() {
            info!("no warmup requests configured");
            return recorder.freeze(started.elapsed(), false);
        }

        let source = Arc::new(if self.single_pass {
            RequestSource::single_pass(specs)
        } else {
            RequestSource::cyclic(specs)
        });
        let abandon = CancellationToken::new();

        info!(
            requests = source.request_count(),
            concurrency = self.concurrency,
            single_pass = self.single_pass,
            "warmup started"
        );

        let mut workers = JoinSet::new();
        for id in 0..self.concurrency {
            workers.spawn(worker(
                id,
                self.client.clone(),
                source.clone(),
                recorder.clone(),
                deadline.clone(),
                abandon.clone(),
                self.request_delay,
            ));
        }

        let drained = tokio::select! {
            _ = drain(&mut workers, &recorder) => true,
            _ = deadline.cancelled() => false,
        };

        if !drained {
            debug!(grace_ms = self.grace.as_millis() as u64, "deadline reached, waiting for in-flight requests");
            if tokio::time::timeout(self.grace, drain(&mut workers, &recorder)).await.is_err() {
                warn!(
                    in_flight = workers.len(),
                    "abandoning in-flight warmup requests"
                );
                abandon.cancel();
                if tokio::time::timeout(ABANDON_WAIT, drain(&mut workers, &recorder))
                    .await
                    .is_err()
                {
                    workers.shutdown().await;
                }
            }
        }

        // Hit when the deadline forced the grace path or left specs undispatched.
        let deadline_hit = !drained || (deadline.is_cancelled() && !source.is_exhausted());
        let summary = recorder.freeze(started.elapsed(), deadline_hit);
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            passes = source.passes(),
            deadline_hit = summary.deadline_hit,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "warmup finished"
        );
        summary
    }
}

async fn drain(workers: &mut JoinSet<()>, recorder: &SummaryRecorder) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!(error = %e, "warmup worker panicked");
                recorder.record_worker_panic(&e.to_string());
            }
        }
    }
}

async fn worker(
    id: usize,
    client: Arc<dyn ProtocolClient>,
    source: Arc<RequestSource>,
    recorder: Arc<SummaryRecorder>,
    deadline: CancellationToken,
    abandon: CancellationToken,
    delay: Duration,
) {
    loop {
        if deadline.is_cancelled() {
            break;
        }
        let Some(spec) = source.next_spec() else {
            break;
        };

        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = abandon.cancelled() => Err(RequestError::Abandoned),
            outcome = client.send(spec) => outcome,
        };
        let result = WarmupResult::from_outcome(spec, started.elapsed(), outcome);
        let pause = match &result.error {
            Some(RequestError::Connect(_)) => delay.max(CONNECT_RETRY_PAUSE),
            _ => delay,
        };
        match &result.error {
            None => debug!(
                worker = id,
                request = %spec,
                latency_ms = result.latency.as_millis() as u64,
                "warmup request succeeded"
            ),
            Some(e) => debug!(
                worker = id,
                request = %spec,
                latency_ms = result.latency.as_millis() as u64,
                error = %e,
                "warmup request failed"
            ),
        }
        recorder.record(&result);

        if !pause.is_zero() {
            tokio::select! {
                biased;
                _ = deadline.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::client::BoxFuture;

    /// Sleeps per request and tracks how many requests run at once.
    struct CountingClient {
        delay: Duration,
        fail: bool,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CountingClient {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                delay,
                fail,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    impl ProtocolClient for CountingClient {
        fn send<'a>(&'a self, _spec: &'a RequestSpec) -> BoxFuture<'a, Result<(), RequestError>> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                if self.fail {
                    Err(RequestError::Connect("refused".to_string()))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn specs(paths: &[&str]) -> Vec<RequestSpec> {
        paths
            .iter()
            .map(|p| RequestSpec::parse_http(&format!("get:{p}")).unwrap())
            .collect()
    }

    fn deadline_after(after: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let timer = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            timer.cancel();
        });
        token
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_concurrency() {
        let client = CountingClient::new(Duration::from_millis(20), false);
        let engine = WarmupEngine::new(client.clone(), 3);

        let summary = engine
            .run(specs(&["/a", "/b"]), &deadline_after(Duration::from_millis(300)))
            .await;

        assert!(client.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(client.peak.load(Ordering::SeqCst), 3);
        // The two specs were cycled far beyond one pass.
        assert!(summary.attempted > 6, "attempted {}", summary.attempted);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.succeeded, summary.attempted);
        assert!(summary.deadline_hit);
    }

    #[tokio::test]
    async fn hanging_target_is_abandoned_after_grace() {
        let client = CountingClient::new(Duration::from_secs(3600), false);
        let engine = WarmupEngine::new(client, 4).with_grace(Duration::from_millis(100));

        let started = Instant::now();
        let summary = engine
            .run(specs(&["/hang"]), &deadline_after(Duration::from_millis(200)))
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.failed, 4);
        assert!(summary.deadline_hit);
        assert!(
            summary
                .last_error
                .as_deref()
                .is_some_and(|e| e.contains("abandoned"))
        );
    }

    #[tokio::test]
    async fn in_flight_requests_finish_within_grace() {
        let client = CountingClient::new(Duration::from_millis(150), false);
        let engine = WarmupEngine::new(client, 2).with_grace(Duration::from_secs(1));

        let summary = engine
            .run(specs(&["/a"]), &deadline_after(Duration::from_millis(50)))
            .await;

        // Both first requests were in flight at the deadline and completed.
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 2);
    }

    #[tokio::test]
    async fn failures_do_not_stop_workers() {
        let client = CountingClient::new(Duration::from_millis(5), true);
        let engine = WarmupEngine::new(client, 2);

        let summary = engine
            .run(specs(&["/a"]), &deadline_after(Duration::from_millis(200)))
            .await;

        assert!(summary.attempted > 2);
        assert_eq!(summary.failed, summary.attempted);
        assert_eq!(summary.succeeded, 0);
        assert!(summary.last_error.is_some());
    }

    #[tokio::test]
    async fn single_pass_stops_before_deadline() {
        let client = CountingClient::new(Duration::from_millis(5), false);
        let engine = WarmupEngine::new(client, 2).with_single_pass(true);
        let deadline = CancellationToken::new();

        let summary = engine.run(specs(&["/a", "/b", "/c"]), &deadline).await;

        assert_eq!(summary.attempted, 3);
        assert!(!summary.deadline_hit);
        assert!(!deadline.is_cancelled());
    }

    #[tokio::test]
    async fn request_delay_is_cancellable() {
        let client = CountingClient::new(Duration::ZERO, false);
        let engine = WarmupEngine::new(client, 1).with_request_delay(Duration::from_secs(3600));

        let started = Instant::now();
        let summary = engine
            .run(specs(&["/a"]), &deadline_after(Duration::from_millis(100)))
            .await;

        assert_eq!(summary.attempted, 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn single_pass_cut_by_deadline_reports_hit() {
        let client = CountingClient::new(Duration::from_secs(3600), false);
        let engine = WarmupEngine::new(client, 2)
            .with_single_pass(true)
            .with_grace(Duration::from_millis(50));

        let summary = engine
            .run(specs(&["/a", "/b"]), &deadline_after(Duration::from_millis(100)))
            .await;

        // Both specs were handed out, but neither finished before the deadline.
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.failed, 2);
        assert!(summary.deadline_hit);
    }

    struct PanickingClient;

    impl ProtocolClient for PanickingClient {
        fn send<'a>(&'a self, spec: &'a RequestSpec) -> BoxFuture<'a, Result<(), RequestError>> {
            Box::pin(async move {
                if spec.path.as_str().starts_with('/') {
                    panic!("render overflowed");
                }
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn panicking_workers_are_counted_as_failures() {
        let engine = WarmupEngine::new(Arc::new(PanickingClient), 3);

        let started = Instant::now();
        let summary = engine
            .run(specs(&["/a"]), &deadline_after(Duration::from_secs(5)))
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.succeeded, 0);
        assert!(!summary.deadline_hit);
        assert!(
            summary
                .last_error
                .as_deref()
                .is_some_and(|e| e.contains("panicked"))
        );
    }

    #[tokio::test]
    async fn refused_connections_are_paced() {
        let client = CountingClient::new(Duration::ZERO, true);
        let engine = WarmupEngine::new(client, 1);

        let summary = engine
            .run(specs(&["/a"]), &deadline_after(Duration::from_millis(200)))
            .await;

        // One attempt per CONNECT_RETRY_PAUSE at most, not a tight loop.
        assert!(summary.attempted >= 1);
        assert!(summary.attempted <= 6, "attempted {}", summary.attempted);
    }

    #[tokio::test]
    async fn empty_specs_finish_immediately() {
        let client = CountingClient::new(Duration::ZERO, false);
        let engine = WarmupEngine::new(client, 4);

        let summary = engine.run(Vec::new(), &CancellationToken::new()).await;
        assert_eq!(summary.attempted, 0);
        assert!(!summary.deadline_hit);
    }

    #[tokio::test]
    async fn cancelled_deadline_dispatches_nothing() {
        let client = CountingClient::new(Duration::ZERO, false);
        let engine = WarmupEngine::new(client, 4);
        let deadline = CancellationToken::new();
        deadline.cancel();

        let summary = engine.run(specs(&["/a"]), &deadline).await;
        assert_eq!(summary.attempted, 0);
        assert!(summary.deadline_hit);
    }
}
