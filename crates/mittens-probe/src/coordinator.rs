//! Readiness coordinator: the single owner of [`ProbeState`].
//!
//! Fuses the warmup summary and the target health outcome into a
//! terminal Ready/Failed decision. Observers (file writer, probe server)
//! hold `watch` receivers and never mutate the state.
//!
//! ```text
//! Starting ──begin_warmup──▶ Warming ──conclude──▶ Ready
//!                                    └──────────▶ Failed
//! ```

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use mittens_health::HealthOutcome;
use mittens_warmup::WarmupSummary;

use crate::state::ProbeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid probe state transition {from} -> {to}")]
pub struct TransitionError {
    pub from: ProbeState,
    pub to: ProbeState,
}

/// Terminal decision plus the reason behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub state: ProbeState,
    pub reason: String,
}

/// Decide the terminal state for a finished warmup cycle.
///
/// `health` is `None` when no health check was configured.
pub fn decide(
    fail_readiness: bool,
    summary: &WarmupSummary,
    health: Option<&HealthOutcome>,
) -> Verdict {
    if let Some(outcome) = health {
        if !outcome.healthy {
            let reason = match &outcome.last_error {
                Some(e) => format!("target never became healthy: {e}"),
                None => "target never became healthy".to_string(),
            };
            return Verdict {
                state: ProbeState::Failed,
                reason,
            };
        }
    }

    if fail_readiness && summary.failed > 0 {
        return Verdict {
            state: ProbeState::Failed,
            reason: format!(
                "{} of {} warmup requests failed",
                summary.failed, summary.attempted
            ),
        };
    }

    Verdict {
        state: ProbeState::Ready,
        reason: format!(
            "{} of {} warmup requests succeeded",
            summary.succeeded, summary.attempted
        ),
    }
}

/// Owns the probe state and enforces the allowed transitions.
pub struct ReadinessCoordinator {
    tx: watch::Sender<ProbeState>,
    fail_readiness: bool,
}

impl ReadinessCoordinator {
    pub fn new(fail_readiness: bool) -> Self {
        let (tx, _rx) = watch::channel(ProbeState::Starting);
        Self { tx, fail_readiness }
    }

    /// Current state snapshot.
    pub fn state(&self) -> ProbeState {
        *self.tx.borrow()
    }

    /// Receiver that observes every subsequent transition.
    pub fn subscribe(&self) -> watch::Receiver<ProbeState> {
        self.tx.subscribe()
    }

    /// Starting → Warming. Call once "alive" has been published.
    pub fn begin_warmup(&self) -> Result<(), TransitionError> {
        self.transition(ProbeState::Warming).map(|_| ())
    }

    /// Warming → Ready | Failed from the warmup and health results.
    pub fn conclude(
        &self,
        summary: &WarmupSummary,
        health: Option<&HealthOutcome>,
    ) -> Result<ProbeState, TransitionError> {
        let verdict = decide(self.fail_readiness, summary, health);
        let state = self.transition(verdict.state)?;
        match state {
            ProbeState::Ready => info!(reason = %verdict.reason, "target is warm, marking ready"),
            _ => warn!(reason = %verdict.reason, "warmup failed, readiness withheld"),
        }
        Ok(state)
    }

    /// Warming → Failed when the cycle cannot complete at all.
    pub fn fail(&self, reason: &str) -> Result<ProbeState, TransitionError> {
        let state = self.transition(ProbeState::Failed)?;
        warn!(%reason, "warmup aborted, readiness withheld");
        Ok(state)
    }

    fn transition(&self, next: ProbeState) -> Result<ProbeState, TransitionError> {
        let mut rejected = None;
        self.tx.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                rejected = Some(TransitionError {
                    from: *current,
                    to: next,
                });
                false
            }
        });

        match rejected {
            Some(err) => Err(err),
            None => Ok(next),
        }
    }
}
