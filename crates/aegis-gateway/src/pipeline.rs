// pipeline.rs — The per-call decision → forward → audit pipeline.
//
// Every call that gets past request validation is evaluated and produces
// exactly one decision record. An allowed call that names a registered tool is
// forwarded and produces one forward record, whether or not the forward
// succeeded. Audit sink failures are logged and never change the response.

use std::sync::Arc;
use std::time::Instant;

use aegis_audit::{hasher, AuditSink, DecisionRecord, ForwardRecord, TraceContext};
use aegis_policy::{EvaluationRequest, Params, PolicyEngine};
use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::Value;
use tracing::Instrument;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::forward::Forwarder;
use crate::registry::ToolRegistry;

/// Header carrying the calling agent's identity.
pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// Optional header naming the agent that delegated the call.
pub const PARENT_AGENT_ID_HEADER: &str = "x-parent-agent-id";

/// A validated inbound tool call.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub tool: String,
    pub action: String,
    pub agent_id: String,
    pub parent_agent_id: Option<String>,
    /// Raw request body, forwarded verbatim on allow.
    pub body: Bytes,
    /// When the gateway started handling the request.
    pub started: Instant,
}

impl ToolCall {
    /// Validate the routing segments and identity headers of a request.
    pub fn from_parts(
        tool: String,
        action: String,
        headers: &HeaderMap,
        body: Bytes,
        started: Instant,
    ) -> Result<Self, GatewayError> {
        if !is_segment(&tool) || !is_segment(&action) {
            return Err(GatewayError::InvalidPath);
        }

        let agent_id = headers
            .get(AGENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(GatewayError::MissingAgentId)?
            .to_string();

        let parent_agent_id = headers
            .get(PARENT_AGENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        Ok(Self {
            tool,
            action,
            agent_id,
            parent_agent_id,
            body,
            started,
        })
    }
}

/// One non-empty path segment. Percent-decoded `/` would change the target.
fn is_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains('/')
}

/// Parse a request body into parameters. Empty (or blank) ⇒ no parameters.
pub fn parse_params(body: &[u8]) -> Result<Params, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Params::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GatewayError::InvalidJson("body must be a JSON object".to_string())),
        Err(e) => Err(GatewayError::InvalidJson(e.to_string())),
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}

/// The tool-call gateway: policy engine, audit sink, registry and client.
pub struct Gateway {
    engine: Arc<PolicyEngine>,
    audit: Arc<dyn AuditSink>,
    tools: ToolRegistry,
    forwarder: Forwarder,
}

impl Gateway {
    pub fn new(
        config: &GatewayConfig,
        engine: Arc<PolicyEngine>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, GatewayError> {
        // The engine evaluates; it must already run the configured strategy.
        if engine.strategy() != config.match_strategy {
            return Err(GatewayError::StrategyMismatch {
                engine: engine.strategy(),
                configured: config.match_strategy,
            });
        }
        Ok(Self {
            engine,
            audit,
            tools: ToolRegistry::new(&config.tools)?,
            forwarder: Forwarder::new(config.forward_timeout())?,
        })
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one validated call through the pipeline.
    pub async fn handle(&self, call: ToolCall) -> Result<Response, GatewayError> {
        let params = parse_params(&call.body)?;
        let params_hash = hasher::fingerprint(&params);

        let decision = self.engine.evaluate(&EvaluationRequest {
            agent_id: &call.agent_id,
            tool: &call.tool,
            action: &call.action,
            params: &params,
        });

        tracing::debug!(
            agent.id = %call.agent_id,
            agent.parent = call.parent_agent_id.as_deref().unwrap_or(""),
            tool.name = %call.tool,
            tool.action = %call.action,
            allowed = decision.allowed,
            "Evaluated tool call"
        );

        let ctx = self.record_decision(DecisionRecord {
            agent_id: call.agent_id.clone(),
            tool: call.tool.clone(),
            action: call.action.clone(),
            allowed: decision.allowed,
            reason: decision.reason.clone(),
            policy_source: decision.policy_source,
            policy_version: decision.policy_version,
            params_hash,
            latency_ms: elapsed_ms(call.started),
        });

        if !decision.allowed {
            return Err(GatewayError::PolicyViolation(decision.reason));
        }

        let url = self
            .tools
            .target(&call.tool, &call.action)
            .ok_or_else(|| GatewayError::UnknownTool(call.tool.clone()))?;

        let forward_started = Instant::now();
        let result = self
            .forwarder
            .forward(&call.tool, &url, call.body)
            .instrument(ctx.span().clone())
            .await;

        self.record_forward(
            &ctx,
            ForwardRecord {
                tool: call.tool,
                action: call.action,
                status: result.as_ref().ok().map(|r| r.status().as_u16()),
                latency_ms: elapsed_ms(forward_started),
            },
        );
        ctx.close();

        result
    }

    fn record_decision(&self, record: DecisionRecord) -> TraceContext {
        match self.audit.record_decision(&record) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(error = %e, agent.id = %record.agent_id, "Failed to record policy decision");
                TraceContext::for_decision(&record)
            }
        }
    }

    fn record_forward(&self, ctx: &TraceContext, record: ForwardRecord) {
        if let Err(e) = self.audit.record_forward(ctx, &record) {
            tracing::warn!(error = %e, tool.name = %record.tool, "Failed to record tool forward");
        }
    }
}
