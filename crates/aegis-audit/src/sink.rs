// sink.rs — The audit sink contract used by the gateway.
//
// The gateway calls `record_decision` once per inbound call and gets back a
// `TraceContext`, an opaque handle it keeps until the request ends. For an
// allowed call it then calls `record_forward` under that context. Where the
// records go is up to the sink:
//
//   JsonlSink  — hash-chained JSONL file, plus a structured tracing event
//   MemorySink — in-process Vec, for tests and embedding

use std::sync::Mutex;

use tracing::Span;
use uuid::Uuid;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditRecord, DecisionRecord, ForwardRecord};
use crate::log::AuditLog;

/// Handle linking the records of one request.
///
/// Holds the `policy.evaluate` span; the span closes when the context is
/// dropped (or explicitly via [`TraceContext::close`]).
#[derive(Debug, Clone)]
pub struct TraceContext {
    trace_id: Uuid,
    span: Span,
}

impl TraceContext {
    /// Open a decision span for `record` under a fresh trace id.
    pub fn for_decision(record: &DecisionRecord) -> Self {
        let trace_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "policy.evaluate",
            trace.id = %trace_id,
            agent.id = %record.agent_id,
            tool.name = %record.tool,
            tool.action = %record.action,
            decision.allow = record.allowed,
            params.hash = %record.params_hash,
            latency.ms = record.latency_ms,
        );
        Self { trace_id, span }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    /// The request's span, for instrumenting follow-up work.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// End the request's span.
    pub fn close(self) {}
}

/// Destination for gateway audit records.
pub trait AuditSink: Send + Sync {
    /// Record a policy decision and open the request's trace context.
    fn record_decision(&self, record: &DecisionRecord) -> Result<TraceContext, AuditError>;

    /// Record the forwarding step of an allowed call.
    fn record_forward(&self, ctx: &TraceContext, record: &ForwardRecord) -> Result<(), AuditError>;
}

fn log_decision(ctx: &TraceContext, record: &DecisionRecord) {
    let _entered = ctx.span.enter();
    if record.allowed {
        tracing::info!(
            agent.id = %record.agent_id,
            tool.name = %record.tool,
            tool.action = %record.action,
            policy.version = record.policy_version.as_deref().unwrap_or(""),
            latency.ms = record.latency_ms,
            "policy decision: allow"
        );
    } else {
        tracing::info!(
            agent.id = %record.agent_id,
            tool.name = %record.tool,
            tool.action = %record.action,
            reason = %record.reason,
            latency.ms = record.latency_ms,
            "policy decision: deny"
        );
    }
}

fn log_forward(ctx: &TraceContext, record: &ForwardRecord) {
    let span = tracing::info_span!(
        parent: &ctx.span,
        "tool.forward",
        tool.name = %record.tool,
        tool.action = %record.action,
        latency.ms = record.latency_ms,
    );
    let _entered = span.enter();
    match record.status {
        Some(status) => tracing::info!(status, "forwarded tool call"),
        None => tracing::warn!("tool call forwarding failed"),
    }
}

/// Audit sink writing to a hash-chained JSONL file.
pub struct JsonlSink {
    log: Mutex<AuditLog>,
}

impl JsonlSink {
    pub fn new(log: AuditLog) -> Self {
        Self {
            log: Mutex::new(log),
        }
    }

    fn append(&self, trace_id: Uuid, record: AuditRecord) -> Result<AuditEvent, AuditError> {
        // A panic mid-append leaves at worst a partial last line, which
        // `verify_chain` reports; keep accepting records.
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.append(trace_id, record)
    }
}

impl AuditSink for JsonlSink {
    fn record_decision(&self, record: &DecisionRecord) -> Result<TraceContext, AuditError> {
        let ctx = TraceContext::for_decision(record);
        log_decision(&ctx, record);
        self.append(ctx.trace_id, AuditRecord::Decision(record.clone()))?;
        Ok(ctx)
    }

    fn record_forward(&self, ctx: &TraceContext, record: &ForwardRecord) -> Result<(), AuditError> {
        log_forward(ctx, record);
        self.append(ctx.trace_id, AuditRecord::Forward(record.clone()))?;
        Ok(())
    }
}

/// Audit sink keeping events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, trace_id: Uuid, record: AuditRecord) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(AuditEvent::new(trace_id, record));
    }
}

impl AuditSink for MemorySink {
    fn record_decision(&self, record: &DecisionRecord) -> Result<TraceContext, AuditError> {
        let ctx = TraceContext::for_decision(record);
        log_decision(&ctx, record);
        self.push(ctx.trace_id, AuditRecord::Decision(record.clone()));
        Ok(ctx)
    }

    fn record_forward(&self, ctx: &TraceContext, record: &ForwardRecord) -> Result<(), AuditError> {
        log_forward(ctx, record);
        self.push(ctx.trace_id, AuditRecord::Forward(record.clone()));
        Ok(())
    }
}
