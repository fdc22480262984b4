//! # aegis-audit
//!
//! Audit trail for the Aegis agent gateway.
//!
//! Every inbound tool call produces a decision record; every allowed call
//! that reaches a tool also produces a forward record. Records carry a
//! SHA-256 fingerprint of the request parameters, never the raw values, and
//! are written through an [`AuditSink`].
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use aegis_audit::{AuditLog, AuditSink, DecisionRecord, JsonlSink, hasher};
//!
//! let sink = JsonlSink::new(AuditLog::open("/tmp/aegis.jsonl").unwrap());
//! let ctx = sink
//!     .record_decision(&DecisionRecord {
//!         agent_id: "finance-agent".into(),
//!         tool: "payments".into(),
//!         action: "create".into(),
//!         allowed: true,
//!         reason: String::new(),
//!         policy_source: None,
//!         policy_version: None,
//!         params_hash: hasher::fingerprint(&serde_json::Map::new()),
//!         latency_ms: 1,
//!     })
//!     .unwrap();
//! ctx.close();
//! ```

pub mod error;
pub mod event;
pub mod hasher;
pub mod log;
pub mod sink;

pub use error::AuditError;
pub use event::{AuditEvent, AuditRecord, DecisionRecord, ForwardRecord};
pub use log::AuditLog;
pub use sink::{AuditSink, JsonlSink, MemorySink, TraceContext};
