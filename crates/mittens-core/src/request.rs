//! Warmup request descriptors and their parser.
//!
//! HTTP entries look like `get:/path` or `post:/path:{"json":"body"}`.
//! TCP entries are either `connect` or `send:<payload>`.
//! gRPC entries name a unary method: `call:/pkg.Service/Method[:payload]`,
//! where the payload is the already-encoded request message.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};
use crate::template::Template;

/// Wire protocol a request is sent over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Tcp,
    Grpc,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
            Protocol::Grpc => "grpc",
        }
    }
}

/// Request verb. HTTP methods, the two TCP actions and the gRPC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    /// Open a TCP connection and close it.
    Connect,
    /// Open a TCP connection, write a payload, and wait for a reply.
    Send,
    /// Invoke a unary gRPC method.
    Call,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Send => "SEND",
            Method::Call => "CALL",
        }
    }

    pub fn protocol(self) -> Protocol {
        match self {
            Method::Connect | Method::Send => Protocol::Tcp,
            Method::Call => Protocol::Grpc,
            _ => Protocol::Http,
        }
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "head" => Ok(Method::Head),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "patch" => Ok(Method::Patch),
            "delete" => Ok(Method::Delete),
            "options" => Ok(Method::Options),
            "connect" => Ok(Method::Connect),
            "send" => Ok(Method::Send),
            "call" => Ok(Method::Call),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable warmup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub protocol: Protocol,
    pub method: Method,
    /// Request path for HTTP, `/Service/Method` for gRPC; empty for TCP.
    pub path: Template,
    /// Request body for HTTP, payload for `send`, message for `call`.
    pub body: Option<Template>,
}

impl RequestSpec {
    /// Parse a single `method:path[:body]` HTTP entry.
    pub fn parse_http(entry: &str) -> ConfigResult<Self> {
        let trimmed = entry.trim();
        let (method_token, rest) = trimmed.split_once(':').unwrap_or((trimmed, ""));

        let method = parse_method(method_token, entry)?;
        if method.protocol() != Protocol::Http {
            return Err(unknown_method(method_token, entry));
        }

        let (path, body) = match rest.split_once(':') {
            Some((path, body)) => (path, Some(body)),
            None => (rest, None),
        };
        let path = path.trim();
        if path.is_empty() {
            return Err(ConfigError::EmptyPath(entry.to_string()));
        }
        if !path.starts_with('/') {
            return Err(ConfigError::RelativePath(entry.to_string()));
        }

        Ok(Self {
            protocol: Protocol::Http,
            method,
            path: Template::parse(path)?,
            body: body
                .filter(|b| !b.is_empty())
                .map(Template::parse)
                .transpose()?,
        })
    }

    /// Parse a single `connect` or `send:<payload>` TCP entry.
    pub fn parse_tcp(entry: &str) -> ConfigResult<Self> {
        let trimmed = entry.trim();
        let (method_token, payload) = match trimmed.split_once(':') {
            Some((method, payload)) => (method, Some(payload)),
            None => (trimmed, None),
        };

        let method = parse_method(method_token, entry)?;
        let body = match method {
            Method::Connect => None,
            Method::Send => {
                let payload = payload
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| ConfigError::MissingPayload(entry.to_string()))?;
                Some(Template::parse(payload)?)
            }
            _ => return Err(unknown_method(method_token, entry)),
        };

        Ok(Self {
            protocol: Protocol::Tcp,
            method,
            path: Template::parse("")?,
            body,
        })
    }

    /// Parse a single `call:/pkg.Service/Method[:payload]` gRPC entry.
    pub fn parse_grpc(entry: &str) -> ConfigResult<Self> {
        let trimmed = entry.trim();
        let (method_token, rest) = trimmed.split_once(':').unwrap_or((trimmed, ""));

        let method = parse_method(method_token, entry)?;
        if method != Method::Call {
            return Err(unknown_method(method_token, entry));
        }

        let (path, payload) = match rest.split_once(':') {
            Some((path, payload)) => (path.trim(), Some(payload)),
            None => (rest.trim(), None),
        };
        if path.is_empty() {
            return Err(ConfigError::EmptyPath(entry.to_string()));
        }
        let Some(service_method) = path.strip_prefix('/') else {
            return Err(ConfigError::RelativePath(entry.to_string()));
        };
        match service_method.split_once('/') {
            Some((service, name))
                if !service.is_empty() && !name.is_empty() && !name.contains('/') => {}
            _ => return Err(ConfigError::InvalidGrpcMethod(entry.to_string())),
        }

        Ok(Self {
            protocol: Protocol::Grpc,
            method,
            path: Template::parse(path)?,
            body: payload
                .filter(|p| !p.is_empty())
                .map(Template::parse)
                .transpose()?,
        })
    }
}

impl fmt::Display for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::Http => write!(f, "{} {}", self.method, self.path.as_str()),
            Protocol::Tcp => write!(f, "tcp {}", self.method),
            Protocol::Grpc => write!(f, "grpc {}", self.path.as_str()),
        }
    }
}

/// Turn configured request entries into the ordered spec list.
///
/// HTTP entries come first, then TCP, then gRPC, each in configured order.
pub fn parse_requests<S: AsRef<str>>(
    http: &[S],
    tcp: &[S],
    grpc: &[S],
) -> ConfigResult<Vec<RequestSpec>> {
    let mut specs = Vec::with_capacity(http.len() + tcp.len() + grpc.len());
    for entry in http {
        specs.push(RequestSpec::parse_http(entry.as_ref())?);
    }
    for entry in tcp {
        specs.push(RequestSpec::parse_tcp(entry.as_ref())?);
    }
    for entry in grpc {
        specs.push(RequestSpec::parse_grpc(entry.as_ref())?);
    }
    Ok(specs)
}

/// Split a comma-separated list of entries.
///
/// A comma only starts a new entry when the text after it begins with a
/// known method token, so JSON bodies and `{{element|a,b}}` placeholders
/// survive intact.
pub fn split_entries(raw: &str) -> Vec<String> {
    let mut entries: Vec<String> = Vec::new();
    for piece in raw.split(',') {
        if piece.trim().is_empty() {
            continue;
        }
        let token = piece.trim_start().split(':').next().unwrap_or_default();
        match entries.last_mut() {
            Some(last) if token.trim().parse::<Method>().is_err() => {
                last.push(',');
                last.push_str(piece);
            }
            _ => entries.push(piece.trim().to_string()),
        }
    }
    entries
}

fn parse_method(token: &str, entry: &str) -> ConfigResult<Method> {
    token
        .trim()
        .parse::<Method>()
        .map_err(|()| unknown_method(token, entry))
}

fn unknown_method(token: &str, entry: &str) -> ConfigError {
    ConfigError::UnknownMethod {
        method: token.trim().to_string(),
        entry: entry.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get() {
        let spec = RequestSpec::parse_http("get:/delay").unwrap();
        assert_eq!(spec.protocol, Protocol::Http);
        assert_eq!(spec.method, Method::Get);
        assert_eq!(spec.path.as_str(), "/delay");
        assert!(spec.body.is_none());
    }

    #[test]
    fn parse_method_is_case_insensitive() {
        let spec = RequestSpec::parse_http("POST:/items").unwrap();
        assert_eq!(spec.method, Method::Post);
    }

    #[test]
    fn parse_post_with_json_body() {
        let spec = RequestSpec::parse_http(r#"post:/db:{"db":"true","n":1}"#).unwrap();
        assert_eq!(spec.method, Method::Post);
        assert_eq!(spec.path.as_str(), "/db");
        assert_eq!(spec.body.unwrap().as_str(), r#"{"db":"true","n":1}"#);
    }

    #[test]
    fn unknown_method_rejected() {
        let err = RequestSpec::parse_http("fetch:/x").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMethod { method, .. } if method == "fetch"));
    }

    #[test]
    fn tcp_verb_rejected_for_http() {
        assert!(matches!(
            RequestSpec::parse_http("send:/x"),
            Err(ConfigError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn empty_path_rejected() {
        assert!(matches!(
            RequestSpec::parse_http("get:"),
            Err(ConfigError::EmptyPath(_))
        ));
        assert!(matches!(
            RequestSpec::parse_http("get"),
            Err(ConfigError::EmptyPath(_))
        ));
    }

    #[test]
    fn relative_path_rejected() {
        assert!(matches!(
            RequestSpec::parse_http("get:health"),
            Err(ConfigError::RelativePath(_))
        ));
    }

    #[test]
    fn tcp_entries() {
        let connect = RequestSpec::parse_tcp("connect").unwrap();
        assert_eq!(connect.method, Method::Connect);
        assert!(connect.body.is_none());

        let send = RequestSpec::parse_tcp("send:PING\r\n").unwrap();
        assert_eq!(send.protocol, Protocol::Tcp);
        assert_eq!(send.body.unwrap().as_str(), "PING\r\n");

        assert!(matches!(
            RequestSpec::parse_tcp("send"),
            Err(ConfigError::MissingPayload(_))
        ));
        assert!(matches!(
            RequestSpec::parse_tcp("get:/x"),
            Err(ConfigError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn grpc_entries() {
        let check = RequestSpec::parse_grpc("call:/grpc.health.v1.Health/Check").unwrap();
        assert_eq!(check.protocol, Protocol::Grpc);
        assert_eq!(check.method, Method::Call);
        assert_eq!(check.path.as_str(), "/grpc.health.v1.Health/Check");
        assert!(check.body.is_none());

        let with_payload = RequestSpec::parse_grpc("call:/pkg.Users/Get:\n\x03bob").unwrap();
        assert_eq!(with_payload.body.unwrap().as_str(), "\n\x03bob");
    }

    #[test]
    fn malformed_grpc_entries_rejected() {
        assert!(matches!(
            RequestSpec::parse_grpc("call:"),
            Err(ConfigError::EmptyPath(_))
        ));
        assert!(matches!(
            RequestSpec::parse_grpc("call:pkg.Users/Get"),
            Err(ConfigError::RelativePath(_))
        ));
        for entry in ["call:/pkg.Users", "call:/pkg.Users/", "call://Get", "call:/a/b/c"] {
            assert!(
                matches!(
                    RequestSpec::parse_grpc(entry),
                    Err(ConfigError::InvalidGrpcMethod(_))
                ),
                "{entry}"
            );
        }
        assert!(matches!(
            RequestSpec::parse_grpc("get:/pkg.Users/Get"),
            Err(ConfigError::UnknownMethod { .. })
        ));
        assert!(matches!(
            RequestSpec::parse_http("call:/pkg.Users/Get"),
            Err(ConfigError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn parse_requests_keeps_order() {
        let specs = parse_requests(
            &["get:/a", "delete:/b"],
            &["connect"],
            &["call:/grpc.health.v1.Health/Check"],
        )
        .unwrap();
        let rendered: Vec<String> = specs.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "GET /a",
                "DELETE /b",
                "tcp CONNECT",
                "grpc /grpc.health.v1.Health/Check"
            ]
        );
    }

    #[test]
    fn split_entries_on_method_boundaries() {
        let entries = split_entries(r#"get:/a,post:/b:{"x":1,"y":2},get:/c/{{element|p,q}}"#);
        assert_eq!(
            entries,
            vec![
                "get:/a".to_string(),
                r#"post:/b:{"x":1,"y":2}"#.to_string(),
                "get:/c/{{element|p,q}}".to_string(),
            ]
        );
    }

    #[test]
    fn split_entries_skips_blanks() {
        assert_eq!(split_entries(" get:/a , "), vec!["get:/a".to_string()]);
        assert!(split_entries("").is_empty());
    }

    #[test]
    fn parse_requests_stops_at_first_invalid() {
        let err = parse_requests(&["get:/a", "bogus:/b"], &[], &[]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMethod { .. }));
    }
}
