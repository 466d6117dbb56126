//! Single-shot readiness probe and retry backoff.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Why a single readiness probe did not report healthy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("http handshake with {address} failed: {reason}")]
    Handshake { address: String, reason: String },

    #[error("request to {uri} failed: {reason}")]
    Request { uri: String, reason: String },

    #[error("{uri} returned status {status}")]
    Status { uri: String, status: u16 },

    #[error("{uri} did not answer within {timeout:?}")]
    Timeout { uri: String, timeout: Duration },
}

/// Issue one `GET` against `address` + `path`.
///
/// Returns the status code on any 2xx, a [`ProbeError`] otherwise.
pub async fn http_probe(
    address: &str,
    path: &str,
    headers: &[(String, String)],
    timeout: Duration,
) -> Result<u16, ProbeError> {
    let uri = format!("http://{address}{path}");

    let attempt = async {
        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|e| ProbeError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ProbeError::Handshake {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let mut builder = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("user-agent", concat!("mittens/", env!("CARGO_PKG_VERSION")));
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let req = builder
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| ProbeError::Request {
                uri: uri.clone(),
                reason: e.to_string(),
            })?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ProbeError::Request {
                uri: uri.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(ProbeError::Status {
                uri: uri.clone(),
                status: status.as_u16(),
            })
        }
    };

    let outcome = tokio::time::timeout(timeout, attempt).await;
    match outcome {
        Ok(result) => {
            if let Err(ref e) = result {
                debug!(error = %e, "readiness probe failed");
            }
            result
        }
        Err(_) => {
            debug!(%uri, "readiness probe timed out");
            Err(ProbeError::Timeout { uri, timeout })
        }
    }
}

/// Exponential backoff between probe attempts.
///
/// Starts at `base` and doubles after every failure up to `max`. A poll
/// ends on the first success, so there is nothing to reset.
#[derive(Debug, Clone)]
pub struct Backoff {
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            max: max.max(base),
            current: base,
        }
    }

    /// Record a failed attempt and return the delay before the next one.
    pub fn fail(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }
}
