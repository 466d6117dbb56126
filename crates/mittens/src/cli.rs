//! Command-line flags.
//!
//! Flags are accepted in both `-flag=value` and `--flag value` form so
//! existing sidecar manifests keep working. Booleans take a bare flag or
//! an explicit `=true` / `=false`.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{CommandFactory, Parser, ValueEnum};

use mittens_core::options::{
    FileProbeLayer, GrpcLayer, HttpLayer, ServerProbeLayer, TargetLayer, TcpLayer,
};
use mittens_core::{ConfigResult, HealthCheckMode, Options, OptionsLayer, split_entries};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "mittens",
    about = "Warmup sidecar: sends synthetic traffic to a target and publishes readiness",
    version
)]
pub struct Cli {
    /// JSON config file; flags override its values.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // ── Target ─────────────────────────────────────────────────
    #[arg(long)]
    pub target_host: Option<String>,

    #[arg(long)]
    pub target_http_port: Option<u16>,

    /// Port polled for readiness (defaults to the HTTP port).
    #[arg(long)]
    pub target_readiness_port: Option<u16>,

    #[arg(long)]
    pub target_readiness_http_path: Option<String>,

    #[arg(long)]
    pub target_readiness_timeout_milliseconds: Option<u64>,

    /// First pause between readiness polls; doubles on each failure.
    #[arg(long)]
    pub target_readiness_backoff_milliseconds: Option<u64>,

    #[arg(long)]
    pub target_readiness_max_backoff_milliseconds: Option<u64>,

    // ── Requests ───────────────────────────────────────────────
    /// `method:path[:body]` entries, comma separated or repeated.
    #[arg(long, value_name = "REQUESTS")]
    pub http_requests: Vec<String>,

    /// `Name: value` header sent with every HTTP request. Repeatable.
    #[arg(long, value_name = "HEADER")]
    pub http_headers: Vec<String>,

    /// `connect` or `send:<payload>` entries, comma separated or repeated.
    #[arg(long, value_name = "REQUESTS")]
    pub tcp_requests: Vec<String>,

    /// `call:/pkg.Service/Method[:payload]` entries, comma separated or repeated.
    #[arg(long, value_name = "REQUESTS")]
    pub grpc_requests: Vec<String>,

    /// Per-request timeout.
    #[arg(long)]
    pub timeout_milliseconds: Option<u64>,

    // ── Warmup ─────────────────────────────────────────────────
    #[arg(long)]
    pub concurrency: Option<usize>,

    #[arg(long)]
    pub max_duration_seconds: Option<u64>,

    #[arg(long)]
    pub request_delay_milliseconds: Option<u64>,

    /// How long in-flight requests may run past the deadline.
    #[arg(long)]
    pub grace_period_milliseconds: Option<u64>,

    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub single_pass: Option<bool>,

    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub fail_readiness: Option<bool>,

    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub exit_after_warmup: Option<bool>,

    /// `sequential`, `parallel`, or `disabled`.
    #[arg(long, value_name = "MODE")]
    pub health_check: Option<HealthCheckMode>,

    // ── Probes ─────────────────────────────────────────────────
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub file_probe_enabled: Option<bool>,

    #[arg(long, value_name = "PATH")]
    pub file_probe_liveness_path: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub file_probe_readiness_path: Option<PathBuf>,

    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub server_probe_enabled: Option<bool>,

    #[arg(long)]
    pub server_probe_port: Option<u16>,

    #[arg(long)]
    pub server_probe_liveness_path: Option<String>,

    #[arg(long)]
    pub server_probe_readiness_path: Option<String>,

    // ── Output ─────────────────────────────────────────────────
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Parse after rewriting single-dash long flags.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_args(args))
    }

    /// The layer contributed by flags alone.
    pub fn to_layer(&self) -> OptionsLayer {
        OptionsLayer {
            target: TargetLayer {
                host: self.target_host.clone(),
                http_port: self.target_http_port,
                readiness_port: self.target_readiness_port,
                readiness_http_path: self.target_readiness_http_path.clone(),
                readiness_timeout_milliseconds: self.target_readiness_timeout_milliseconds,
                readiness_backoff_milliseconds: self.target_readiness_backoff_milliseconds,
                readiness_max_backoff_milliseconds: self
                    .target_readiness_max_backoff_milliseconds,
            },
            http: HttpLayer {
                requests: entries(&self.http_requests),
                headers: (!self.http_headers.is_empty()).then(|| self.http_headers.clone()),
                timeout_milliseconds: self.timeout_milliseconds,
            },
            tcp: TcpLayer {
                requests: entries(&self.tcp_requests),
            },
            grpc: GrpcLayer {
                requests: entries(&self.grpc_requests),
            },
            file_probe: FileProbeLayer {
                enabled: self.file_probe_enabled,
                liveness_path: self.file_probe_liveness_path.clone(),
                readiness_path: self.file_probe_readiness_path.clone(),
            },
            server_probe: ServerProbeLayer {
                enabled: self.server_probe_enabled,
                port: self.server_probe_port,
                liveness_path: self.server_probe_liveness_path.clone(),
                readiness_path: self.server_probe_readiness_path.clone(),
            },
            concurrency: self.concurrency,
            max_duration_seconds: self.max_duration_seconds,
            exit_after_warmup: self.exit_after_warmup,
            fail_readiness: self.fail_readiness,
            request_delay_milliseconds: self.request_delay_milliseconds,
            grace_period_milliseconds: self.grace_period_milliseconds,
            single_pass: self.single_pass,
            health_check: self.health_check,
        }
    }

    /// Defaults ← config file ← flags, validated.
    pub fn resolve_options(&self) -> ConfigResult<Options> {
        let file = match &self.config {
            Some(path) => OptionsLayer::from_file(path)?,
            None => OptionsLayer::default(),
        };
        file.merge(self.to_layer()).resolve()
    }
}

fn entries(raw: &[String]) -> Option<Vec<String>> {
    if raw.is_empty() {
        return None;
    }
    Some(raw.iter().flat_map(|r| split_entries(r)).collect())
}

/// Rewrite `-flag` / `-flag=value` into `--flag` form for known long flags.
///
/// Anything that is not a known flag name is passed through untouched,
/// so values that happen to start with `-` survive.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = Cli::command();
    let longs: Vec<&str> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long())
        .chain(["help", "version"])
        .collect();

    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(i, arg)| match arg.to_str() {
            Some(s) if i > 0 && is_single_dash_long(s, &longs) => OsString::from(format!("-{s}")),
            _ => arg,
        })
        .collect()
}

fn is_single_dash_long(arg: &str, longs: &[&str]) -> bool {
    let Some(rest) = arg.strip_prefix('-') else {
        return false;
    };
    if rest.starts_with('-') {
        return false;
    }
    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
    longs.contains(&name)
}
