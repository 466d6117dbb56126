//! Warmup results and their aggregate.
//!
//! Workers record into a shared [`SummaryRecorder`] using atomics for
//! the counters; only the last error sits behind a lock. Results are
//! commutative, so recording order does not matter.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mittens_core::RequestSpec;

use crate::client::RequestError;

/// Outcome of one dispatched request.
#[derive(Debug)]
pub struct WarmupResult<'a> {
    pub spec: &'a RequestSpec,
    pub success: bool,
    pub latency: Duration,
    pub error: Option<RequestError>,
}

impl<'a> WarmupResult<'a> {
    pub fn from_outcome(
        spec: &'a RequestSpec,
        latency: Duration,
        outcome: Result<(), RequestError>,
    ) -> Self {
        match outcome {
            Ok(()) => Self {
                spec,
                success: true,
                latency,
                error: None,
            },
            Err(error) => Self {
                spec,
                success: false,
                latency,
                error: Some(error),
            },
        }
    }
}

/// Frozen totals for a finished warmup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmupSummary {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub elapsed: Duration,
    pub deadline_hit: bool,
    pub max_latency: Duration,
    /// Most recently recorded failure, as `"<request>: <error>"`.
    pub last_error: Option<String>,
}

/// Thread-safe accumulator for [`WarmupResult`]s.
#[derive(Debug, Default)]
pub struct SummaryRecorder {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    max_latency_us: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl SummaryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: &WarmupResult<'_>) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        let latency_us = u64::try_from(result.latency.as_micros()).unwrap_or(u64::MAX);
        self.max_latency_us.fetch_max(latency_us, Ordering::Relaxed);

        if result.success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            let message = match &result.error {
                Some(error) => format!("{}: {error}", result.spec),
                None => format!("{}: failed", result.spec),
            };
            *self.last_error.lock().expect("last error lock") = Some(message);
        }
    }

    /// Count a worker that died mid-request as one failed attempt.
    pub fn record_worker_panic(&self, reason: &str) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().expect("last error lock") =
            Some(format!("warmup worker panicked: {reason}"));
    }

    /// Snapshot the totals into a [`WarmupSummary`].
    pub fn freeze(&self, elapsed: Duration, deadline_hit: bool) -> WarmupSummary {
        WarmupSummary {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            elapsed,
            deadline_hit,
            max_latency: Duration::from_micros(self.max_latency_us.load(Ordering::Relaxed)),
            last_error: self.last_error.lock().expect("last error lock").clone(),
        }
    }
}
