//! # aegis-gateway
//!
//! HTTP tool-call gateway for the Aegis agent platform.
//!
//! Agents call `POST /tools/{tool}/{action}` with an `X-Agent-ID` header and
//! a JSON object body. The gateway evaluates the call against the
//! [`aegis_policy::PolicyEngine`], records the decision through an
//! [`aegis_audit::AuditSink`], and either rejects it (`403 PolicyViolation`)
//! or forwards the body verbatim to the tool's registered base URL and relays
//! the tool's response unchanged.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aegis_audit::MemorySink;
//! use aegis_gateway::{build_app, Gateway, GatewayConfig};
//! use aegis_policy::PolicyEngine;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (engine, _report) = PolicyEngine::open("policies")?;
//! let gateway = Gateway::new(&GatewayConfig::default(), Arc::new(engine), Arc::new(MemorySink::new()))?;
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, build_app(Arc::new(gateway))).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod forward;
pub mod pipeline;
pub mod registry;
pub mod server;

pub use config::{GatewayConfig, DEFAULT_FORWARD_TIMEOUT};
pub use error::GatewayError;
pub use forward::Forwarder;
pub use pipeline::{Gateway, ToolCall, AGENT_ID_HEADER, PARENT_AGENT_ID_HEADER};
pub use registry::ToolRegistry;
pub use server::build_app;
