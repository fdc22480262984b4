//! Integration tests for the gateway HTTP surface.

use std::convert::Infallible;
use std::time::Duration;

use aegis_policy::MatchStrategy;
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use tower::ServiceExt;

use aegis_audit::AuditRecord;

mod common;

use common::{test_gateway, test_gateway_over, test_gateway_with};

fn tool_call(path: &str, agent: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(path).header("content-type", "application/json");
    if let Some(agent) = agent {
        builder = builder.header("X-Agent-ID", agent);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// End-to-end policy scenarios
// ============================================================================

#[tokio::test]
async fn finance_agent_over_limit_is_denied() {
    let gw = test_gateway().await;

    let response = send(
        &gw.app,
        tool_call(
            "/tools/payments/create",
            Some("finance-agent"),
            json!({"amount": 50000, "currency": "USD", "vendor_id": "V99"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"], "PolicyViolation");
    assert!(body["reason"].as_str().unwrap().contains("max_amount=5000"));
    assert!(!body.to_string().contains("V99"));
}

#[tokio::test]
async fn finance_agent_within_limit_is_forwarded() {
    let gw = test_gateway().await;

    let response = send(
        &gw.app,
        tool_call(
            "/tools/payments/create",
            Some("finance-agent"),
            json!({"amount": 3000, "currency": "USD", "vendor_id": "V123"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-tool-stub"], "yes");
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["received"]["vendor_id"], "V123");
    assert_eq!(body["received"]["amount"], 3000);
}

#[tokio::test]
async fn hr_agent_reads_inside_prefix() {
    let gw = test_gateway().await;

    let response = send(
        &gw.app,
        tool_call(
            "/tools/files/read",
            Some("hr-agent"),
            json!({"path": "/hr-docs/employee1.txt"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["received"]["path"], "/hr-docs/employee1.txt");
}

#[tokio::test]
async fn hr_agent_reads_outside_prefix_is_denied() {
    let gw = test_gateway().await;

    let response = send(
        &gw.app,
        tool_call(
            "/tools/files/read",
            Some("hr-agent"),
            json!({"path": "/legal/contract.docx"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert!(body["reason"].as_str().unwrap().contains("/hr-docs/"));
}

#[tokio::test]
async fn unknown_agent_gets_generic_reason() {
    let gw = test_gateway().await;

    let response = send(
        &gw.app,
        tool_call("/tools/payments/create", Some("intern-agent"), json!({"amount": 1})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(
        body["reason"],
        "Agent intern-agent is not allowed to perform action create on tool payments"
    );
}

// ============================================================================
// Audit records
// ============================================================================

#[tokio::test]
async fn denied_call_records_only_a_decision() {
    let gw = test_gateway().await;

    send(
        &gw.app,
        tool_call("/tools/payments/create", Some("finance-agent"), json!({"amount": 9000})),
    )
    .await;

    let events = gw.audit_events();
    assert_eq!(events.len(), 1);
    match &events[0].record {
        AuditRecord::Decision(d) => {
            assert!(!d.allowed);
            assert_eq!(d.agent_id, "finance-agent");
            assert_eq!(d.policy_version.as_deref(), Some("1.0"));
            assert_eq!(d.params_hash.len(), 64);
        }
        other => panic!("expected decision, got {:?}", other),
    }
}

#[tokio::test]
async fn allowed_call_records_decision_and_forward() {
    let gw = test_gateway().await;

    send(
        &gw.app,
        tool_call("/tools/files/read", Some("hr-agent"), json!({"path": "/hr-docs/a.txt"})),
    )
    .await;

    let events = gw.audit_events();
    assert_eq!(events.len(), 2);
    assert!(events[0].is_decision());
    assert_eq!(events[0].trace_id, events[1].trace_id);
    match &events[1].record {
        AuditRecord::Forward(f) => {
            assert_eq!(f.tool, "files");
            assert_eq!(f.action, "read");
            assert_eq!(f.status, Some(200));
        }
        other => panic!("expected forward, got {:?}", other),
    }
}

#[tokio::test]
async fn audit_never_contains_raw_params() {
    let gw = test_gateway().await;

    send(
        &gw.app,
        tool_call(
            "/tools/payments/create",
            Some("finance-agent"),
            json!({"amount": 10, "currency": "USD", "vendor_id": "SECRET-VENDOR"}),
        ),
    )
    .await;

    let serialized = serde_json::to_string(&gw.audit_events()).unwrap();
    assert!(!serialized.contains("SECRET-VENDOR"));
}

// ============================================================================
// Request validation
// ============================================================================

#[tokio::test]
async fn missing_agent_header_is_bad_request() {
    let gw = test_gateway().await;

    let response = send(&gw.app, tool_call("/tools/payments/create", None, json!({}))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "MissingAgentId");
    assert!(gw.audit_events().is_empty());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let gw = test_gateway().await;

    let request = Request::post("/tools/payments/create")
        .header("X-Agent-ID", "finance-agent")
        .body(Body::from("{\"amount\": "))
        .unwrap();
    let response = send(&gw.app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "InvalidJson");
    assert!(gw.audit_events().is_empty());
}

#[tokio::test]
async fn non_object_json_is_bad_request() {
    let gw = test_gateway().await;

    let response = send(
        &gw.app,
        tool_call("/tools/payments/create", Some("finance-agent"), json!([1, 2, 3])),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "InvalidJson");
}

#[tokio::test]
async fn empty_body_is_empty_params() {
    let gw = test_gateway().await;

    let request = Request::post("/tools/payments/create")
        .header("X-Agent-ID", "finance-agent")
        .body(Body::empty())
        .unwrap();
    let response = send(&gw.app, request).await;

    // No amount or currency: the conditions have nothing to check.
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_path_shapes_are_invalid_path() {
    let gw = test_gateway().await;

    for path in ["/tools/payments", "/tools/payments/create/extra", "/tools"] {
        let response = send(&gw.app, tool_call(path, Some("finance-agent"), json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(json_body(response).await["error"], "InvalidPath");
    }

    let response = send(&gw.app, tool_call("/nothing/here", Some("finance-agent"), json!({}))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn allowed_call_to_unregistered_tool_is_unknown_tool() {
    let gw = test_gateway().await;

    let response = send(
        &gw.app,
        tool_call("/tools/crm/lookup", Some("sales-agent"), json!({"customer": "c-1"})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "UnknownTool");

    // The decision is still audited; nothing was forwarded.
    let events = gw.audit_events();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_decision());
}

// ============================================================================
// Forwarding
// ============================================================================

#[tokio::test]
async fn downstream_error_status_is_passed_through() {
    let gw = test_gateway().await;

    let response = send(&gw.app, tool_call("/tools/payments/reject", Some("ops-agent"), json!({}))).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["status"], "rejected");

    match &gw.audit_events()[1].record {
        AuditRecord::Forward(f) => assert_eq!(f.status, Some(422)),
        other => panic!("expected forward, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_tool_is_bad_gateway() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let gw = test_gateway_with(|config| {
        config
            .tools
            .insert("payments".to_string(), format!("http://{}", closed));
    })
    .await;

    let response = send(
        &gw.app,
        tool_call("/tools/payments/create", Some("finance-agent"), json!({"amount": 10})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "ForwardFailed");

    let events = gw.audit_events();
    assert_eq!(events.len(), 2);
    match &events[1].record {
        AuditRecord::Forward(f) => assert_eq!(f.status, None),
        other => panic!("expected forward, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_tool_is_gateway_timeout() {
    let gw = test_gateway_with(|config| config.forward_timeout_secs = 1).await;

    let response = send(&gw.app, tool_call("/tools/payments/slow", Some("ops-agent"), json!({}))).await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json_body(response).await["error"], "ForwardTimeout");
}

// ============================================================================
// Match strategy
// ============================================================================

const CAPPED_POLICY: &str = r#"
version: "1.0"
agents:
  - id: finance-agent
    allow:
      - tool: payments
        actions: [create]
        conditions:
          max_amount: 10
"#;

const OPEN_POLICY: &str = r#"
version: "1.0"
agents:
  - id: finance-agent
    allow:
      - tool: payments
        actions: [create]
"#;

#[tokio::test]
async fn first_match_stops_at_failing_rule() {
    let gw = test_gateway_over(
        &[("a-capped.yaml", CAPPED_POLICY), ("b-open.yaml", OPEN_POLICY)],
        |_| {},
    )
    .await;

    let response = send(
        &gw.app,
        tool_call("/tools/payments/create", Some("finance-agent"), json!({"amount": 50})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["reason"], "Amount exceeds max_amount=10");
}

#[tokio::test]
async fn configured_any_allowance_reaches_later_rule() {
    let gw = test_gateway_over(
        &[("a-capped.yaml", CAPPED_POLICY), ("b-open.yaml", OPEN_POLICY)],
        |config| config.match_strategy = MatchStrategy::AnyAllowance,
    )
    .await;

    let response = send(
        &gw.app,
        tool_call("/tools/payments/create", Some("finance-agent"), json!({"amount": 50})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    match &gw.audit_events()[0].record {
        AuditRecord::Decision(d) => {
            assert!(d.allowed);
            assert!(d.policy_source.as_deref().unwrap().ends_with("b-open.yaml"));
        }
        other => panic!("expected decision, got {:?}", other),
    }
}

// ============================================================================
// Timing
// ============================================================================

#[tokio::test]
async fn decision_latency_includes_body_upload() {
    let gw = test_gateway().await;

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, Infallible>>(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = tx.send(Ok(Bytes::from_static(br#"{"amount": 9000}"#))).await;
    });
    let request = Request::post("/tools/payments/create")
        .header("content-type", "application/json")
        .header("X-Agent-ID", "finance-agent")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap();

    let response = send(&gw.app, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    match &gw.audit_events()[0].record {
        AuditRecord::Decision(d) => assert!(d.latency_ms >= 250, "latency {}ms", d.latency_ms),
        other => panic!("expected decision, got {:?}", other),
    }
}

// ============================================================================
// Operational endpoints
// ============================================================================

#[tokio::test]
async fn livez_is_ok() {
    let gw = test_gateway().await;

    let response = send(&gw.app, Request::get("/livez").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn admin_policies_lists_sources_in_order() {
    let gw = test_gateway().await;

    let response = send(
        &gw.app,
        Request::get("/admin/policies").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let sources: Vec<&str> = body["policies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["source"].as_str().unwrap())
        .collect();
    assert_eq!(sources.len(), 3);
    assert!(sources[0].ends_with("finance.yaml"));
    assert!(sources[1].ends_with("hr.yaml"));
    assert!(sources[2].ends_with("ops.yaml"));
    assert_eq!(body["policies"][2]["version"], "2.3");
}
