//! mittens-probe — readiness state and the probes that publish it.
//!
//! # Architecture
//!
//! ```text
//! ReadinessCoordinator ── watch::Sender<ProbeState>
//!   ├── FileProbeWriter::observe(rx)   alive / ready sentinel files
//!   └── ProbeServer (axum)             GET /alive, GET /ready
//! ```
//!
//! The coordinator is the only writer. Probes are observers and only
//! ever reflect the latest published state.

pub mod coordinator;
pub mod file;
pub mod server;
pub mod state;

pub use coordinator::{ReadinessCoordinator, TransitionError, Verdict, decide};
pub use file::FileProbeWriter;
pub use server::{ProbeServer, build_router};
pub use state::ProbeState;
