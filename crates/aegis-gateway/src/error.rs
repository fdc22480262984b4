// error.rs — Error types for the tool-call gateway.
//
// Request-time variants render as `{"error": <kind>, "reason": <text>}` with
// the status code the caller should see. Setup variants (bad registry entry,
// HTTP client construction) only surface while building the gateway.

use aegis_policy::MatchStrategy;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while handling a tool call or building the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The target is not `/tools/{tool}/{action}`.
    #[error("Invalid path. Expected: /tools/{{tool}}/{{action}}")]
    InvalidPath,

    /// `X-Agent-ID` is absent, empty or not valid UTF-8.
    #[error("Missing X-Agent-ID header")]
    MissingAgentId,

    /// The body is not empty and not a JSON object.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The policy allowed the call but no tool with this name is registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The policy denied the call. The reason is returned verbatim.
    #[error("{0}")]
    PolicyViolation(String),

    /// The downstream tool could not be reached or its response not read.
    #[error("Failed to forward request to tool {tool}: {reason}")]
    ForwardFailed { tool: String, reason: String },

    /// The downstream tool did not answer within the forward timeout.
    #[error("Tool {tool} did not respond within {timeout_secs}s")]
    ForwardTimeout { tool: String, timeout_secs: u64 },

    /// A registry entry is not a usable base URL.
    #[error("invalid base URL for tool {tool}: {reason}")]
    InvalidToolUrl { tool: String, reason: String },

    /// The policy engine was built with a different match strategy than configured.
    #[error("policy engine uses match strategy {engine:?} but {configured:?} is configured")]
    StrategyMismatch {
        engine: MatchStrategy,
        configured: MatchStrategy,
    },

    /// The outbound HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl GatewayError {
    /// Machine-readable kind, used as the `error` field of the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidPath => "InvalidPath",
            GatewayError::MissingAgentId => "MissingAgentId",
            GatewayError::InvalidJson(_) => "InvalidJson",
            GatewayError::UnknownTool(_) => "UnknownTool",
            GatewayError::PolicyViolation(_) => "PolicyViolation",
            GatewayError::ForwardFailed { .. } => "ForwardFailed",
            GatewayError::ForwardTimeout { .. } => "ForwardTimeout",
            GatewayError::InvalidToolUrl { .. }
            | GatewayError::StrategyMismatch { .. }
            | GatewayError::Client(_) => "ConfigError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidPath
            | GatewayError::MissingAgentId
            | GatewayError::InvalidJson(_)
            | GatewayError::UnknownTool(_) => StatusCode::BAD_REQUEST,
            GatewayError::PolicyViolation(_) => StatusCode::FORBIDDEN,
            GatewayError::ForwardFailed { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::ForwardTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::InvalidToolUrl { .. }
            | GatewayError::StrategyMismatch { .. }
            | GatewayError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Response body shared by every gateway-generated error.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    reason: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind(),
            reason: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
