//! Common test utilities.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tempfile::TempDir;

use aegis_audit::{AuditEvent, MemorySink};
use aegis_gateway::{build_app, Gateway, GatewayConfig};
use aegis_policy::PolicyEngine;

pub const FINANCE_POLICY: &str = r#"
version: "1.0"
agents:
  - id: finance-agent
    allow:
      - tool: payments
        actions: [create]
        conditions:
          max_amount: 5000
          currencies: [USD, EUR]
"#;

pub const HR_POLICY: &str = r#"
version: "1.0"
agents:
  - id: hr-agent
    allow:
      - tool: files
        actions: [read]
        conditions:
          folder_prefix: /hr-docs/
"#;

/// Unconditional grants: one on a tool the registry does not know about,
/// and the stub's failure-mode actions.
pub const OPS_POLICY: &str = r#"
version: "2.3"
agents:
  - id: sales-agent
    allow:
      - tool: crm
        actions: [lookup]
  - id: ops-agent
    allow:
      - tool: payments
        actions: [reject, slow]
"#;

/// A gateway router wired to an in-memory audit sink and a stub downstream.
pub struct TestGateway {
    pub app: Router,
    pub audit: Arc<MemorySink>,
    _policies: TempDir,
}

impl TestGateway {
    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit.events()
    }
}

/// Stub downstream tool. Echoes the body it received under `received`.
///
///   POST /create, /read — 200 JSON, header `x-tool-stub: yes`
///   POST /reject        — 422 JSON
///   POST /slow          — answers after 3s
pub async fn spawn_tool_stub() -> SocketAddr {
    async fn echo(body: Bytes) -> impl IntoResponse {
        let received: serde_json::Value =
            serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (
            [("x-tool-stub", "yes")],
            Json(serde_json::json!({ "status": "ok", "received": received })),
        )
    }

    async fn reject() -> impl IntoResponse {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "status": "rejected" })),
        )
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(3)).await;
        "late"
    }

    let app = Router::new()
        .route("/create", post(echo))
        .route("/read", post(echo))
        .route("/reject", post(reject))
        .route("/slow", post(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Gateway over the finance and HR policies, both tools pointing at one stub.
pub async fn test_gateway() -> TestGateway {
    test_gateway_with(|_| {}).await
}

pub async fn test_gateway_with(configure: impl FnOnce(&mut GatewayConfig)) -> TestGateway {
    test_gateway_over(
        &[
            ("finance.yaml", FINANCE_POLICY),
            ("hr.yaml", HR_POLICY),
            ("ops.yaml", OPS_POLICY),
        ],
        configure,
    )
    .await
}

/// Gateway over the given policy files. The engine runs the configured
/// match strategy.
pub async fn test_gateway_over(
    files: &[(&str, &str)],
    configure: impl FnOnce(&mut GatewayConfig),
) -> TestGateway {
    let policies = TempDir::new().unwrap();
    for (name, content) in files {
        std::fs::write(policies.path().join(name), content).unwrap();
    }

    let tool_addr = spawn_tool_stub().await;
    let base = format!("http://{}", tool_addr);
    let mut config = GatewayConfig {
        tools: BTreeMap::from([
            ("payments".to_string(), base.clone()),
            ("files".to_string(), base),
        ]),
        forward_timeout_secs: 30,
        ..GatewayConfig::default()
    };
    configure(&mut config);

    let (engine, report) = PolicyEngine::open(policies.path()).unwrap();
    assert!(report.is_clean());
    let engine = engine.with_strategy(config.match_strategy);
    let audit = Arc::new(MemorySink::new());
    let gateway = Gateway::new(&config, Arc::new(engine), audit.clone()).unwrap();

    TestGateway {
        app: build_app(Arc::new(gateway)),
        audit,
        _policies: policies,
    }
}
