//! Configuration errors.
//!
//! Every variant is fatal at startup: the sidecar refuses to publish
//! "alive" for a configuration it cannot act on.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading, merging, or validating options.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unrecognized method `{method}` in request `{entry}`")]
    UnknownMethod { method: String, entry: String },

    #[error("request `{0}` has an empty path")]
    EmptyPath(String),

    #[error("request `{0}` path must start with '/'")]
    RelativePath(String),

    #[error("grpc request `{0}` must name `/Service/Method`")]
    InvalidGrpcMethod(String),

    #[error("tcp request `{0}` is missing its payload")]
    MissingPayload(String),

    #[error("unknown template placeholder `{{{{{0}}}}}`")]
    UnknownPlaceholder(String),

    #[error("invalid template placeholder `{{{{{placeholder}}}}}`: {reason}")]
    InvalidPlaceholder { placeholder: String, reason: String },

    #[error("invalid header `{0}`, expected `Name: value`")]
    InvalidHeader(String),

    #[error("invalid option {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.into(),
        }
    }
}
