// forward.rs — Outbound forwarding of allowed tool calls.
//
// The request body goes downstream byte-for-byte as `POST {base}/{action}`
// with `Content-Type: application/json`. The downstream status, headers and
// body come back unmodified, except hop-by-hop headers: the gateway buffers
// the body and re-frames it, so those no longer describe the connection.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderName};
use axum::response::Response;

use crate::error::GatewayError;

/// Headers scoped to a single connection (RFC 9110 §7.6.1).
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// HTTP client for downstream tools, bounded by a per-call timeout.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Client)?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `body` to `url` and buffer the downstream response.
    ///
    /// Any downstream status, 2xx or not, is a successful forward.
    pub async fn forward(&self, tool: &str, url: &str, body: Bytes) -> Result<Response, GatewayError> {
        let downstream = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_error(tool, e))?;

        let status = downstream.status();
        let headers = downstream.headers().clone();
        let bytes = downstream.bytes().await.map_err(|e| self.map_error(tool, e))?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        for (name, value) in headers.iter() {
            if !is_hop_by_hop(name) {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }
        Ok(response)
    }

    fn map_error(&self, tool: &str, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::ForwardTimeout {
                tool: tool.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            GatewayError::ForwardFailed {
                tool: tool.to_string(),
                reason: err.without_url().to_string(),
            }
        }
    }
}
