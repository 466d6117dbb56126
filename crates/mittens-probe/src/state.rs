//! Probe state published to the orchestrator.

use std::fmt;

use serde::Serialize;

/// Lifecycle of one warmup cycle.
///
/// `Starting` is live but not ready. `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeState {
    Starting,
    Warming,
    Ready,
    Failed,
}

impl ProbeState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeState::Starting => "starting",
            ProbeState::Warming => "warming",
            ProbeState::Ready => "ready",
            ProbeState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProbeState::Ready | ProbeState::Failed)
    }

    /// Whether the readiness signal should be positive.
    pub fn is_ready(self) -> bool {
        self == ProbeState::Ready
    }

    pub(crate) fn can_transition_to(self, next: ProbeState) -> bool {
        match self {
            ProbeState::Starting => next == ProbeState::Warming,
            ProbeState::Warming => next.is_terminal(),
            ProbeState::Ready | ProbeState::Failed => false,
        }
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_transitions() {
        assert!(ProbeState::Starting.can_transition_to(ProbeState::Warming));
        assert!(ProbeState::Warming.can_transition_to(ProbeState::Ready));
        assert!(ProbeState::Warming.can_transition_to(ProbeState::Failed));
    }

    #[test]
    fn terminal_states_are_final() {
        for next in [
            ProbeState::Starting,
            ProbeState::Warming,
            ProbeState::Ready,
            ProbeState::Failed,
        ] {
            assert!(!ProbeState::Ready.can_transition_to(next));
            assert!(!ProbeState::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn starting_cannot_skip_warming() {
        assert!(!ProbeState::Starting.can_transition_to(ProbeState::Ready));
        assert!(!ProbeState::Starting.can_transition_to(ProbeState::Failed));
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProbeState::Warming).unwrap(),
            "\"warming\""
        );
    }
}
