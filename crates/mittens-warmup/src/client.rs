//! Protocol clients.
//!
//! The engine only sees [`ProtocolClient`]: "send this request to the
//! target and tell me whether it worked". [`TargetClient`] routes each
//! spec to the HTTP, TCP or gRPC implementation by its protocol.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use mittens_core::{ConfigResult, Method, Options, Protocol, RequestSpec};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Why a single warmup request failed. Always non-fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("target returned status {0}")]
    Status(u16),

    #[error("target returned grpc-status {0}")]
    GrpcStatus(u32),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed before any reply")]
    Closed,

    #[error("abandoned after the warmup deadline")]
    Abandoned,

    #[error("no client configured for {0} requests")]
    Unsupported(&'static str),
}

/// Executes one request against the target.
pub trait ProtocolClient: Send + Sync + 'static {
    fn send<'a>(&'a self, spec: &'a RequestSpec) -> BoxFuture<'a, Result<(), RequestError>>;
}

// ── HTTP ───────────────────────────────────────────────────────

/// Pooled HTTP/1 client bound to one target address.
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    address: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(address: impl Into<String>, headers: Vec<(String, String)>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            address: address.into(),
            headers,
            timeout,
        }
    }

    async fn execute(&self, spec: &RequestSpec) -> Result<(), RequestError> {
        let uri = format!("http://{}{}", self.address, spec.path.render());
        let body = spec
            .body
            .as_ref()
            .map(|b| Bytes::from(b.render()))
            .unwrap_or_default();

        let mut builder = http::Request::builder()
            .method(http_method(spec.method))
            .uri(&uri)
            .header("user-agent", concat!("mittens/", env!("CARGO_PKG_VERSION")));
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let req = builder
            .body(Full::new(body))
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        let resp = self.client.request(req).await.map_err(client_error)?;

        let status = resp.status();
        // Drain the body so the connection goes back to the pool.
        resp.into_body()
            .collect()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        if status.is_success() {
            Ok(())
        } else {
            Err(RequestError::Status(status.as_u16()))
        }
    }
}

impl ProtocolClient for HttpClient {
    fn send<'a>(&'a self, spec: &'a RequestSpec) -> BoxFuture<'a, Result<(), RequestError>> {
        Box::pin(async move {
            tokio::time::timeout(self.timeout, self.execute(spec))
                .await
                .unwrap_or(Err(RequestError::Timeout(self.timeout)))
        })
    }
}

fn client_error(e: hyper_util::client::legacy::Error) -> RequestError {
    if e.is_connect() {
        RequestError::Connect(e.to_string())
    } else {
        RequestError::Transport(e.to_string())
    }
}

fn http_method(method: Method) -> http::Method {
    match method {
        Method::Get => http::Method::GET,
        Method::Head => http::Method::HEAD,
        Method::Post => http::Method::POST,
        Method::Put => http::Method::PUT,
        Method::Patch => http::Method::PATCH,
        Method::Delete => http::Method::DELETE,
        Method::Options => http::Method::OPTIONS,
        Method::Connect => http::Method::CONNECT,
        // Never produced for HTTP specs; the parser rejects them.
        Method::Send | Method::Call => http::Method::POST,
    }
}

// ── TCP ────────────────────────────────────────────────────────

/// Raw TCP client: connect, optionally write a payload and await a reply.
#[derive(Debug, Clone)]
pub struct TcpClient {
    address: String,
    timeout: Duration,
}

impl TcpClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    async fn execute(&self, spec: &RequestSpec) -> Result<(), RequestError> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| RequestError::Connect(e.to_string()))?;

        if let Some(payload) = spec.body.as_ref() {
            stream
                .write_all(payload.render().as_bytes())
                .await
                .map_err(|e| RequestError::Transport(e.to_string()))?;

            let mut buf = [0u8; 512];
            let read = stream
                .read(&mut buf)
                .await
                .map_err(|e| RequestError::Transport(e.to_string()))?;
            if read == 0 {
                return Err(RequestError::Closed);
            }
        }

        let _ = stream.shutdown().await;
        Ok(())
    }
}

impl ProtocolClient for TcpClient {
    fn send<'a>(&'a self, spec: &'a RequestSpec) -> BoxFuture<'a, Result<(), RequestError>> {
        Box::pin(async move {
            tokio::time::timeout(self.timeout, self.execute(spec))
                .await
                .unwrap_or(Err(RequestError::Timeout(self.timeout)))
        })
    }
}

// ── gRPC ───────────────────────────────────────────────────────

/// Unary gRPC client over cleartext HTTP/2.
///
/// The configured payload is sent as the request message unchanged, so
/// it must already be protobuf-encoded. An empty payload is the empty
/// message, which every request type accepts.
#[derive(Clone)]
pub struct GrpcClient {
    client: Client<HttpConnector, Full<Bytes>>,
    address: String,
    timeout: Duration,
}

impl GrpcClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .http2_only(true)
            .build_http();
        Self {
            client,
            address: address.into(),
            timeout,
        }
    }

    async fn execute(&self, spec: &RequestSpec) -> Result<(), RequestError> {
        let uri = format!("http://{}{}", self.address, spec.path.render());
        let message = spec
            .body
            .as_ref()
            .map(|b| b.render().into_bytes())
            .unwrap_or_default();

        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(&uri)
            .header("content-type", "application/grpc")
            .header("te", "trailers")
            .header("user-agent", concat!("mittens/", env!("CARGO_PKG_VERSION")))
            .body(Full::new(grpc_frame(&message)?))
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        let resp = self.client.request(req).await.map_err(client_error)?;
        let (parts, body) = resp.into_parts();
        let collected = body
            .collect()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        if !parts.status.is_success() {
            return Err(RequestError::Status(parts.status.as_u16()));
        }

        // Trailers-only responses carry the status in the headers.
        let code = parts
            .headers
            .get("grpc-status")
            .or_else(|| collected.trailers().and_then(|t| t.get("grpc-status")))
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());

        match code {
            Some(0) => Ok(()),
            Some(code) => Err(RequestError::GrpcStatus(code)),
            None => Err(RequestError::Transport(
                "response carried no grpc-status".to_string(),
            )),
        }
    }
}

impl ProtocolClient for GrpcClient {
    fn send<'a>(&'a self, spec: &'a RequestSpec) -> BoxFuture<'a, Result<(), RequestError>> {
        Box::pin(async move {
            tokio::time::timeout(self.timeout, self.execute(spec))
                .await
                .unwrap_or(Err(RequestError::Timeout(self.timeout)))
        })
    }
}

/// Length-prefixed message: compressed flag, big-endian length, bytes.
fn grpc_frame(message: &[u8]) -> Result<Bytes, RequestError> {
    let len = u32::try_from(message.len())
        .map_err(|_| RequestError::Transport("grpc message too large".to_string()))?;
    let mut frame = Vec::with_capacity(5 + message.len());
    frame.push(0);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(message);
    Ok(Bytes::from(frame))
}

// ── Routing ────────────────────────────────────────────────────

/// Routes each spec to the client for its protocol.
#[derive(Clone)]
pub struct TargetClient {
    http: Option<HttpClient>,
    tcp: Option<TcpClient>,
    grpc: Option<GrpcClient>,
}

impl TargetClient {
    pub fn new(
        http: Option<HttpClient>,
        tcp: Option<TcpClient>,
        grpc: Option<GrpcClient>,
    ) -> Self {
        Self { http, tcp, grpc }
    }

    /// Every client aimed at the target's traffic port.
    pub fn from_options(options: &Options) -> ConfigResult<Self> {
        let address = options.target.http_address();
        let timeout = options.request_timeout();
        Ok(Self {
            http: Some(HttpClient::new(
                address.clone(),
                options.http.header_pairs()?,
                timeout,
            )),
            tcp: Some(TcpClient::new(address.clone(), timeout)),
            grpc: Some(GrpcClient::new(address, timeout)),
        })
    }
}

impl ProtocolClient for TargetClient {
    fn send<'a>(&'a self, spec: &'a RequestSpec) -> BoxFuture<'a, Result<(), RequestError>> {
        match (spec.protocol, &self.http, &self.tcp, &self.grpc) {
            (Protocol::Http, Some(http), _, _) => http.send(spec),
            (Protocol::Tcp, _, Some(tcp), _) => tcp.send(spec),
            (Protocol::Grpc, _, _, Some(grpc)) => grpc.send(spec),
            (protocol, ..) => {
                Box::pin(async move { Err(RequestError::Unsupported(protocol.as_str())) })
            }
        }
    }
}
