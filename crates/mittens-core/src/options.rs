//! Sidecar options and layered configuration.
//!
//! Options are assembled from up to three layers, later layers winning
//! field by field:
//!
//! ```text
//! built-in defaults ← JSON config file ← command-line flags
//! ```
//!
//! Each source produces an [`OptionsLayer`] (every field optional);
//! [`OptionsLayer::resolve`] fills the gaps from the defaults and
//! validates the result into an immutable [`Options`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::request::{RequestSpec, parse_requests};

pub const DEFAULT_TARGET_HOST: &str = "localhost";
pub const DEFAULT_TARGET_HTTP_PORT: u16 = 8080;
pub const DEFAULT_READINESS_PATH: &str = "/ready";
pub const DEFAULT_SERVER_PROBE_PORT: u16 = 8000;

/// How the target health check is sequenced against warmup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckMode {
    /// Wait for the target to report healthy, then warm up with the time left.
    #[default]
    Sequential,
    /// Poll and warm up at the same time.
    Parallel,
    /// Never poll; readiness depends on warmup alone.
    Disabled,
}

impl HealthCheckMode {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthCheckMode::Sequential => "sequential",
            HealthCheckMode::Parallel => "parallel",
            HealthCheckMode::Disabled => "disabled",
        }
    }
}

impl fmt::Display for HealthCheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthCheckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(HealthCheckMode::Sequential),
            "parallel" => Ok(HealthCheckMode::Parallel),
            "disabled" => Ok(HealthCheckMode::Disabled),
            other => Err(format!(
                "unknown health check mode `{other}` (expected sequential, parallel, or disabled)"
            )),
        }
    }
}

// ── Resolved options ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOptions {
    pub host: String,
    pub http_port: u16,
    pub readiness_port: u16,
    pub readiness_http_path: String,
    pub readiness_timeout_milliseconds: u64,
    pub readiness_backoff_milliseconds: u64,
    pub readiness_max_backoff_milliseconds: u64,
}

impl TargetOptions {
    /// `host:port` the warmup traffic is sent to.
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// `host:port` the health checker polls.
    pub fn readiness_address(&self) -> String {
        format!("{}:{}", self.host, self.readiness_port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub requests: Vec<String>,
    pub headers: Vec<String>,
    pub timeout_milliseconds: u64,
}

impl HttpOptions {
    /// Headers split into `(name, value)` pairs.
    pub fn header_pairs(&self) -> ConfigResult<Vec<(String, String)>> {
        self.headers.iter().map(|h| parse_header(h)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpOptions {
    pub requests: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcOptions {
    pub requests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProbeOptions {
    pub enabled: bool,
    pub alive_path: PathBuf,
    pub ready_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProbeOptions {
    pub enabled: bool,
    pub port: u16,
    pub liveness_path: String,
    pub readiness_path: String,
}

/// Fully resolved, validated sidecar options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub target: TargetOptions,
    pub http: HttpOptions,
    pub tcp: TcpOptions,
    pub grpc: GrpcOptions,
    pub file_probe: FileProbeOptions,
    pub server_probe: ServerProbeOptions,
    pub concurrency: usize,
    pub max_duration_seconds: u64,
    pub exit_after_warmup: bool,
    pub fail_readiness: bool,
    pub request_delay_milliseconds: u64,
    pub grace_period_milliseconds: u64,
    pub single_pass: bool,
    pub health_check: HealthCheckMode,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            target: TargetOptions {
                host: DEFAULT_TARGET_HOST.to_string(),
                http_port: DEFAULT_TARGET_HTTP_PORT,
                readiness_port: DEFAULT_TARGET_HTTP_PORT,
                readiness_http_path: DEFAULT_READINESS_PATH.to_string(),
                readiness_timeout_milliseconds: 2_000,
                readiness_backoff_milliseconds: 250,
                readiness_max_backoff_milliseconds: 2_000,
            },
            http: HttpOptions {
                requests: Vec::new(),
                headers: Vec::new(),
                timeout_milliseconds: 10_000,
            },
            tcp: TcpOptions::default(),
            grpc: GrpcOptions::default(),
            file_probe: FileProbeOptions {
                enabled: false,
                alive_path: PathBuf::from("alive"),
                ready_path: PathBuf::from("ready"),
            },
            server_probe: ServerProbeOptions {
                enabled: false,
                port: DEFAULT_SERVER_PROBE_PORT,
                liveness_path: "/alive".to_string(),
                readiness_path: "/ready".to_string(),
            },
            concurrency: 2,
            max_duration_seconds: 60,
            exit_after_warmup: false,
            fail_readiness: false,
            request_delay_milliseconds: 0,
            grace_period_milliseconds: 1_000,
            single_pass: false,
            health_check: HealthCheckMode::Sequential,
        }
    }
}

impl Options {
    /// Parse every configured request entry: HTTP, then TCP, then gRPC.
    pub fn request_specs(&self) -> ConfigResult<Vec<RequestSpec>> {
        parse_requests(&self.http.requests, &self.tcp.requests, &self.grpc.requests)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_seconds)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_milliseconds)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_milliseconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.http.timeout_milliseconds)
    }

    /// Check the invariants the rest of the sidecar relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.concurrency < 1 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }
        if self.max_duration_seconds == 0 {
            return Err(ConfigError::invalid(
                "max-duration-seconds",
                "must be greater than 0",
            ));
        }
        if self.target.host.trim().is_empty() {
            return Err(ConfigError::invalid("target-host", "must not be empty"));
        }
        if self.target.http_port == 0 {
            return Err(ConfigError::invalid("target-http-port", "must not be 0"));
        }
        if self.target.readiness_port == 0 {
            return Err(ConfigError::invalid("target-readiness-port", "must not be 0"));
        }
        if !self.target.readiness_http_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "target-readiness-http-path",
                "must start with '/'",
            ));
        }
        if self.target.readiness_timeout_milliseconds == 0 {
            return Err(ConfigError::invalid(
                "target-readiness-timeout-milliseconds",
                "must be greater than 0",
            ));
        }
        if self.target.readiness_backoff_milliseconds == 0 {
            return Err(ConfigError::invalid(
                "target-readiness-backoff-milliseconds",
                "must be greater than 0",
            ));
        }
        if self.target.readiness_max_backoff_milliseconds < self.target.readiness_backoff_milliseconds
        {
            return Err(ConfigError::invalid(
                "target-readiness-max-backoff-milliseconds",
                "must not be below the base backoff",
            ));
        }
        if self.http.timeout_milliseconds == 0 {
            return Err(ConfigError::invalid(
                "timeout-milliseconds",
                "must be greater than 0",
            ));
        }
        if self.file_probe.enabled && self.file_probe.alive_path == self.file_probe.ready_path {
            return Err(ConfigError::invalid(
                "file-probe-readiness-path",
                "must differ from the liveness path",
            ));
        }
        if self.server_probe.enabled {
            for (name, path) in [
                ("server-probe-liveness-path", &self.server_probe.liveness_path),
                ("server-probe-readiness-path", &self.server_probe.readiness_path),
            ] {
                if !path.starts_with('/') {
                    return Err(ConfigError::invalid(name, "must start with '/'"));
                }
            }
            if self.server_probe.liveness_path == self.server_probe.readiness_path {
                return Err(ConfigError::invalid(
                    "server-probe-readiness-path",
                    "must differ from the liveness path",
                ));
            }
        }

        self.http.header_pairs()?;
        self.request_specs()?;
        Ok(())
    }
}

/// Split a `Name: value` header.
pub fn parse_header(raw: &str) -> ConfigResult<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| ConfigError::InvalidHeader(raw.to_string()))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidHeader(raw.to_string()));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

// ── Layers ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetLayer {
    pub host: Option<String>,
    pub http_port: Option<u16>,
    pub readiness_port: Option<u16>,
    pub readiness_http_path: Option<String>,
    pub readiness_timeout_milliseconds: Option<u64>,
    pub readiness_backoff_milliseconds: Option<u64>,
    pub readiness_max_backoff_milliseconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HttpLayer {
    pub requests: Option<Vec<String>>,
    pub headers: Option<Vec<String>>,
    pub timeout_milliseconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TcpLayer {
    pub requests: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GrpcLayer {
    pub requests: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FileProbeLayer {
    pub enabled: Option<bool>,
    pub liveness_path: Option<PathBuf>,
    pub readiness_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerProbeLayer {
    pub enabled: Option<bool>,
    pub port: Option<u16>,
    pub liveness_path: Option<String>,
    pub readiness_path: Option<String>,
}

/// One source of option values; unset fields defer to earlier layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct OptionsLayer {
    pub target: TargetLayer,
    pub http: HttpLayer,
    pub tcp: TcpLayer,
    pub grpc: GrpcLayer,
    pub file_probe: FileProbeLayer,
    pub server_probe: ServerProbeLayer,
    pub concurrency: Option<usize>,
    pub max_duration_seconds: Option<u64>,
    pub exit_after_warmup: Option<bool>,
    pub fail_readiness: Option<bool>,
    pub request_delay_milliseconds: Option<u64>,
    pub grace_period_milliseconds: Option<u64>,
    pub single_pass: Option<bool>,
    pub health_check: Option<HealthCheckMode>,
}

impl OptionsLayer {
    /// Load a layer from a JSON config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `over` onto `self`; fields set in `over` win.
    pub fn merge(self, over: OptionsLayer) -> OptionsLayer {
        OptionsLayer {
            target: TargetLayer {
                host: over.target.host.or(self.target.host),
                http_port: over.target.http_port.or(self.target.http_port),
                readiness_port: over.target.readiness_port.or(self.target.readiness_port),
                readiness_http_path: over
                    .target
                    .readiness_http_path
                    .or(self.target.readiness_http_path),
                readiness_timeout_milliseconds: over
                    .target
                    .readiness_timeout_milliseconds
                    .or(self.target.readiness_timeout_milliseconds),
                readiness_backoff_milliseconds: over
                    .target
                    .readiness_backoff_milliseconds
                    .or(self.target.readiness_backoff_milliseconds),
                readiness_max_backoff_milliseconds: over
                    .target
                    .readiness_max_backoff_milliseconds
                    .or(self.target.readiness_max_backoff_milliseconds),
            },
            http: HttpLayer {
                requests: over.http.requests.or(self.http.requests),
                headers: over.http.headers.or(self.http.headers),
                timeout_milliseconds: over
                    .http
                    .timeout_milliseconds
                    .or(self.http.timeout_milliseconds),
            },
            tcp: TcpLayer {
                requests: over.tcp.requests.or(self.tcp.requests),
            },
            grpc: GrpcLayer {
                requests: over.grpc.requests.or(self.grpc.requests),
            },
            file_probe: FileProbeLayer {
                enabled: over.file_probe.enabled.or(self.file_probe.enabled),
                liveness_path: over.file_probe.liveness_path.or(self.file_probe.liveness_path),
                readiness_path: over
                    .file_probe
                    .readiness_path
                    .or(self.file_probe.readiness_path),
            },
            server_probe: ServerProbeLayer {
                enabled: over.server_probe.enabled.or(self.server_probe.enabled),
                port: over.server_probe.port.or(self.server_probe.port),
                liveness_path: over
                    .server_probe
                    .liveness_path
                    .or(self.server_probe.liveness_path),
                readiness_path: over
                    .server_probe
                    .readiness_path
                    .or(self.server_probe.readiness_path),
            },
            concurrency: over.concurrency.or(self.concurrency),
            max_duration_seconds: over.max_duration_seconds.or(self.max_duration_seconds),
            exit_after_warmup: over.exit_after_warmup.or(self.exit_after_warmup),
            fail_readiness: over.fail_readiness.or(self.fail_readiness),
            request_delay_milliseconds: over
                .request_delay_milliseconds
                .or(self.request_delay_milliseconds),
            grace_period_milliseconds: over
                .grace_period_milliseconds
                .or(self.grace_period_milliseconds),
            single_pass: over.single_pass.or(self.single_pass),
            health_check: over.health_check.or(self.health_check),
        }
    }

    /// Fill unset fields from the defaults and validate.
    pub fn resolve(self) -> ConfigResult<Options> {
        let d = Options::default();
        let http_port = self.target.http_port.unwrap_or(d.target.http_port);

        let options = Options {
            target: TargetOptions {
                host: self.target.host.unwrap_or(d.target.host),
                http_port,
                // The readiness port follows the traffic port unless set explicitly.
                readiness_port: self.target.readiness_port.unwrap_or(http_port),
                readiness_http_path: self
                    .target
                    .readiness_http_path
                    .unwrap_or(d.target.readiness_http_path),
                readiness_timeout_milliseconds: self
                    .target
                    .readiness_timeout_milliseconds
                    .unwrap_or(d.target.readiness_timeout_milliseconds),
                readiness_backoff_milliseconds: self
                    .target
                    .readiness_backoff_milliseconds
                    .unwrap_or(d.target.readiness_backoff_milliseconds),
                readiness_max_backoff_milliseconds: self
                    .target
                    .readiness_max_backoff_milliseconds
                    .unwrap_or(d.target.readiness_max_backoff_milliseconds),
            },
            http: HttpOptions {
                requests: self.http.requests.unwrap_or(d.http.requests),
                headers: self.http.headers.unwrap_or(d.http.headers),
                timeout_milliseconds: self
                    .http
                    .timeout_milliseconds
                    .unwrap_or(d.http.timeout_milliseconds),
            },
            tcp: TcpOptions {
                requests: self.tcp.requests.unwrap_or(d.tcp.requests),
            },
            grpc: GrpcOptions {
                requests: self.grpc.requests.unwrap_or(d.grpc.requests),
            },
            file_probe: FileProbeOptions {
                enabled: self.file_probe.enabled.unwrap_or(d.file_probe.enabled),
                alive_path: self
                    .file_probe
                    .liveness_path
                    .unwrap_or(d.file_probe.alive_path),
                ready_path: self
                    .file_probe
                    .readiness_path
                    .unwrap_or(d.file_probe.ready_path),
            },
            server_probe: ServerProbeOptions {
                enabled: self.server_probe.enabled.unwrap_or(d.server_probe.enabled),
                port: self.server_probe.port.unwrap_or(d.server_probe.port),
                liveness_path: self
                    .server_probe
                    .liveness_path
                    .unwrap_or(d.server_probe.liveness_path),
                readiness_path: self
                    .server_probe
                    .readiness_path
                    .unwrap_or(d.server_probe.readiness_path),
            },
            concurrency: self.concurrency.unwrap_or(d.concurrency),
            max_duration_seconds: self.max_duration_seconds.unwrap_or(d.max_duration_seconds),
            exit_after_warmup: self.exit_after_warmup.unwrap_or(d.exit_after_warmup),
            fail_readiness: self.fail_readiness.unwrap_or(d.fail_readiness),
            request_delay_milliseconds: self
                .request_delay_milliseconds
                .unwrap_or(d.request_delay_milliseconds),
            grace_period_milliseconds: self
                .grace_period_milliseconds
                .unwrap_or(d.grace_period_milliseconds),
            single_pass: self.single_pass.unwrap_or(d.single_pass),
            health_check: self.health_check.unwrap_or(d.health_check),
        };

        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Protocol;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "concurrency": 4,
        "exitAfterWarmup": true,
        "maxDurationSeconds": 5,
        "fileProbe": { "enabled": true },
        "serverProbe": { "enabled": true, "port": 8001 },
        "http": { "requests": ["get:/delay"], "headers": ["X-Warmup: 1"] },
        "target": { "readinessHttpPath": "/health" }
    }"#;

    #[test]
    fn defaults_resolve() {
        let options = OptionsLayer::default().resolve().unwrap();
        assert_eq!(options, Options::default());
        assert_eq!(options.target.readiness_port, DEFAULT_TARGET_HTTP_PORT);
    }

    #[test]
    fn json_layer_resolves() {
        let layer: OptionsLayer = serde_json::from_str(SAMPLE).unwrap();
        let options = layer.resolve().unwrap();
        assert_eq!(options.concurrency, 4);
        assert!(options.exit_after_warmup);
        assert_eq!(options.max_duration_seconds, 5);
        assert!(options.file_probe.enabled);
        assert!(options.server_probe.enabled);
        assert_eq!(options.server_probe.port, 8001);
        assert_eq!(options.http.requests, vec!["get:/delay".to_string()]);
        assert_eq!(options.target.readiness_http_path, "/health");
        assert_eq!(
            options.http.header_pairs().unwrap(),
            vec![("X-Warmup".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn from_file_reads_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let layer = OptionsLayer::from_file(file.path()).unwrap();
        assert_eq!(layer.concurrency, Some(4));
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let err = OptionsLayer::from_file(Path::new("/nonexistent/mittens.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = serde_json::from_str::<OptionsLayer>(r#"{"concurency": 3}"#);
        assert!(err.is_err());
    }

    #[test]
    fn later_layer_wins() {
        let file: OptionsLayer = serde_json::from_str(SAMPLE).unwrap();
        let flags = OptionsLayer {
            concurrency: Some(8),
            target: TargetLayer {
                http_port: Some(9090),
                ..Default::default()
            },
            ..Default::default()
        };

        let options = file.merge(flags).resolve().unwrap();
        assert_eq!(options.concurrency, 8);
        assert_eq!(options.target.http_port, 9090);
        // Untouched by flags, kept from the file.
        assert_eq!(options.max_duration_seconds, 5);
        assert_eq!(options.target.readiness_http_path, "/health");
        // Readiness port follows the overridden traffic port.
        assert_eq!(options.target.readiness_port, 9090);
    }

    #[test]
    fn explicit_readiness_port_kept() {
        let layer = OptionsLayer {
            target: TargetLayer {
                http_port: Some(1111),
                readiness_port: Some(8080),
                ..Default::default()
            },
            ..Default::default()
        };
        let options = layer.resolve().unwrap();
        assert_eq!(options.target.http_address(), "localhost:1111");
        assert_eq!(options.target.readiness_address(), "localhost:8080");
    }

    #[test]
    fn zero_concurrency_rejected() {
        let layer = OptionsLayer {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            layer.resolve(),
            Err(ConfigError::Invalid { name: "concurrency", .. })
        ));
    }

    #[test]
    fn zero_duration_rejected() {
        let layer = OptionsLayer {
            max_duration_seconds: Some(0),
            ..Default::default()
        };
        assert!(layer.resolve().is_err());
    }

    #[test]
    fn zero_readiness_timeout_rejected() {
        let layer = OptionsLayer {
            target: TargetLayer {
                readiness_timeout_milliseconds: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            layer.resolve(),
            Err(ConfigError::Invalid {
                name: "target-readiness-timeout-milliseconds",
                ..
            })
        ));
    }

    #[test]
    fn out_of_range_date_offset_rejected_at_resolve() {
        let layer = OptionsLayer {
            http: HttpLayer {
                requests: Some(vec!["get:/d/{{currentDate|days+100000000}}".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            layer.resolve(),
            Err(ConfigError::InvalidPlaceholder { .. })
        ));
    }

    #[test]
    fn invalid_request_rejected_at_resolve() {
        let layer = OptionsLayer {
            http: HttpLayer {
                requests: Some(vec!["yank:/x".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            layer.resolve(),
            Err(ConfigError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn grpc_requests_follow_http_and_tcp() {
        let layer: OptionsLayer = serde_json::from_str(
            r#"{ "http": { "requests": ["get:/a"] },
                 "tcp": { "requests": ["connect"] },
                 "grpc": { "requests": ["call:/grpc.health.v1.Health/Check"] } }"#,
        )
        .unwrap();
        let options = layer.resolve().unwrap();
        let protocols: Vec<Protocol> = options
            .request_specs()
            .unwrap()
            .iter()
            .map(|spec| spec.protocol)
            .collect();
        assert_eq!(protocols, vec![Protocol::Http, Protocol::Tcp, Protocol::Grpc]);

        let layer = OptionsLayer {
            grpc: GrpcLayer {
                requests: Some(vec!["call:/Health".to_string()]),
            },
            ..Default::default()
        };
        assert!(matches!(
            layer.resolve(),
            Err(ConfigError::InvalidGrpcMethod(_))
        ));
    }

    #[test]
    fn identical_probe_paths_rejected() {
        let layer = OptionsLayer {
            server_probe: ServerProbeLayer {
                enabled: Some(true),
                liveness_path: Some("/probe".to_string()),
                readiness_path: Some("/probe".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(layer.resolve().is_err());

        let layer = OptionsLayer {
            file_probe: FileProbeLayer {
                enabled: Some(true),
                liveness_path: Some(PathBuf::from("probe")),
                readiness_path: Some(PathBuf::from("probe")),
            },
            ..Default::default()
        };
        assert!(layer.resolve().is_err());
    }

    #[test]
    fn header_parsing() {
        assert_eq!(
            parse_header("Accept:  application/json ").unwrap(),
            ("Accept".to_string(), "application/json".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
        assert!(parse_header("Bad Name: v").is_err());
    }

    #[test]
    fn health_check_mode_parses() {
        assert_eq!(
            "Parallel".parse::<HealthCheckMode>().unwrap(),
            HealthCheckMode::Parallel
        );
        assert!("sometimes".parse::<HealthCheckMode>().is_err());
        let layer: OptionsLayer = serde_json::from_str(r#"{"healthCheck": "disabled"}"#).unwrap();
        assert_eq!(layer.health_check, Some(HealthCheckMode::Disabled));
    }
}
