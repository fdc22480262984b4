// server.rs — HTTP surface of the gateway.
//
// Routes:
//   POST /tools/{tool}/{action} — mediated tool call
//   GET  /livez                 — liveness probe
//   GET  /admin/policies        — loaded policy sources (read-only)
// Any other path under /tools/ is an InvalidPath error; everything else 404s.

use std::sync::Arc;
use std::time::Instant;

use aegis_policy::PolicySummary;
use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::GatewayError;
use crate::pipeline::{Gateway, ToolCall};

pub fn build_app(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route(
            "/tools/{tool}/{action}",
            post(tool_call).route_layer(middleware::from_fn(stamp_arrival)),
        )
        .route("/livez", get(livez))
        .route("/admin/policies", get(list_policies))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// When a tool call arrived, recorded before its body is read.
#[derive(Debug, Clone, Copy)]
struct Arrival(Instant);

async fn stamp_arrival(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(Arrival(Instant::now()));
    next.run(request).await
}

async fn tool_call(
    State(gateway): State<Arc<Gateway>>,
    Path((tool, action)): Path<(String, String)>,
    Extension(Arrival(started)): Extension<Arrival>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match ToolCall::from_parts(tool, action, &headers, body, started) {
        Ok(call) => gateway.handle(call).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => response,
        Err(e) => {
            if e.status().is_server_error() {
                tracing::warn!(error = %e, "Tool call failed");
            }
            e.into_response()
        }
    }
}

async fn livez() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct PoliciesResponse {
    policies: Vec<PolicySummary>,
}

async fn list_policies(State(gateway): State<Arc<Gateway>>) -> Json<PoliciesResponse> {
    Json(PoliciesResponse {
        policies: gateway.engine().store().summaries(),
    })
}

async fn fallback(uri: Uri) -> Response {
    let path = uri.path();
    if path == "/tools" || path.starts_with("/tools/") {
        GatewayError::InvalidPath.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}
