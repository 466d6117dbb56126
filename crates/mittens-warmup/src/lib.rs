//! mittens-warmup — synthetic warmup traffic against the target.
//!
//! # Architecture
//!
//! ```text
//! WarmupEngine::run(specs, deadline)
//!   ├── RequestSource      shared cyclic cursor over the specs
//!   ├── worker × concurrency
//!   │   └── ProtocolClient::send(spec) → Ok | RequestError
//!   └── SummaryRecorder    atomics → WarmupSummary
//! ```
//!
//! Request failures are recorded and never stop the run. The run ends
//! when the deadline token fires (plus a bounded grace for in-flight
//! requests) or, in single-pass mode, when every spec was tried once.

pub mod client;
pub mod engine;
pub mod source;
pub mod summary;

pub use client::{GrpcClient, HttpClient, ProtocolClient, RequestError, TargetClient, TcpClient};
pub use engine::WarmupEngine;
pub use source::RequestSource;
pub use summary::{SummaryRecorder, WarmupResult, WarmupSummary};
