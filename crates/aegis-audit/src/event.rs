// event.rs — Audit event data model.
//
// The gateway emits two kinds of records: one `decision` per inbound call and
// one `forward` per allowed call that reached a tool. Both share an envelope
// (`AuditEvent`) with a trace id linking the forward to its decision, and a
// `previous_hash` linking each line of the log to the one before it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The policy decision for one inbound call.
///
/// Carries a fingerprint of the request parameters, never the values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecisionRecord {
    pub agent_id: String,
    pub tool: String,
    pub action: String,
    pub allowed: bool,
    /// Denial reason. Empty (and omitted from JSON) on allow.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Source of the policy that decided, when one did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<String>,
    /// SHA-256 fingerprint of the canonical request parameters.
    pub params_hash: String,
    /// Time from request start to decision.
    pub latency_ms: u64,
}

/// The forwarding step for an allowed call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardRecord {
    pub tool: String,
    pub action: String,
    /// Downstream HTTP status. `None` when the call never got a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub latency_ms: u64,
}

/// What an event records. Serialized inline with a `kind` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Decision(DecisionRecord),
    Forward(ForwardRecord),
}

/// A single audit event — one line in the JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Shared by a decision and the forward that followed it.
    pub trace_id: Uuid,
    #[serde(flatten)]
    pub record: AuditRecord,
    /// SHA-256 of the previous line in the log. `None` for the first line.
    #[serde(default)]
    pub previous_hash: Option<String>,
}

impl AuditEvent {
    /// Wrap a record with a fresh event id and the current time.
    pub fn new(trace_id: Uuid, record: AuditRecord) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            trace_id,
            record,
            previous_hash: None,
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self.record, AuditRecord::Decision(_))
    }

    pub fn is_forward(&self) -> bool {
        matches!(self.record, AuditRecord::Forward(_))
    }
}
