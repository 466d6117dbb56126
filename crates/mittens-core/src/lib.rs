//! mittens-core — shared types for the mittens warmup sidecar.
//!
//! - [`options`]: layered configuration (defaults, JSON file, flags)
//!   resolved into validated [`Options`]
//! - [`request`]: parsing `method:path` entries into [`RequestSpec`]s
//! - [`template`]: per-dispatch placeholders in paths and bodies
//! - [`error`]: [`ConfigError`], the only error that aborts startup

pub mod error;
pub mod options;
pub mod request;
pub mod template;

pub use error::{ConfigError, ConfigResult};
pub use options::{HealthCheckMode, Options, OptionsLayer};
pub use request::{Method, Protocol, RequestSpec, parse_requests, split_entries};
pub use template::Template;
