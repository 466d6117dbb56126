//! mittens-health — target readiness polling.
//!
//! Before (or while) warmup traffic is sent, the sidecar needs to know
//! whether the target answers on its readiness endpoint at all.
//!
//! ```text
//! TargetHealthChecker::poll(cancel)
//!   ├── http_probe() → Ok(status) | Err(ProbeError)
//!   ├── Backoff (base → doubling → max)
//!   └── HealthOutcome { healthy, attempts, last_error }
//! ```
//!
//! Polling starts immediately and stops on the first 2xx or when the
//! shared deadline token fires, whichever comes first.

pub mod checker;
pub mod poller;

pub use checker::{Backoff, ProbeError, http_probe};
pub use poller::{HealthOutcome, TargetHealthChecker};
