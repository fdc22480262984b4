//! # aegis-daemon
//!
//! Aegis agent gateway daemon.
//!
//! Serves `POST /tools/{tool}/{action}` over HTTP. Every call is evaluated
//! against the YAML policies in the policy directory (hot-reloaded on
//! change), audited to a hash-chained JSONL log, and either rejected or
//! forwarded to the tool's registered base URL.
//!
//! ## Usage
//!
//! ```text
//! aegis-daemon --config aegis.toml
//! aegis-daemon --policies-dir ./policies --listen 127.0.0.1:8080 --log-json
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use aegis_audit::{AuditLog, JsonlSink};
use aegis_gateway::{build_app, Gateway};
use aegis_policy::{PolicyEngine, PolicyWatcher};

use crate::config::{DaemonConfig, Overrides};

/// Aegis agent tool-call gateway.
#[derive(Parser)]
#[command(name = "aegis-daemon", version, about = "Policy-enforcing gateway for agent tool calls")]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (overrides the config file).
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,

    /// Policy directory (overrides the config file).
    #[arg(long)]
    policies_dir: Option<PathBuf>,

    /// Audit log path (overrides the config file).
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("aegis_gateway=info".parse()?)
        .add_directive("aegis_policy=info".parse()?)
        .add_directive("aegis_audit=info".parse()?)
        .add_directive("aegis_daemon=info".parse()?);

    // Logs go to stderr; stdout stays free for the caller.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_ansi(false).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    config.apply_overrides(Overrides {
        listen: cli.listen,
        policies_dir: cli.policies_dir,
        audit_log: cli.audit_log,
    });

    init_tracing(cli.log_json)?;

    tracing::info!("Starting Aegis gateway");

    let audit_log = AuditLog::open(&config.audit_log)
        .with_context(|| format!("failed to open audit log {}", config.audit_log.display()))?;
    tracing::info!(path = %config.audit_log.display(), "Audit log ready");
    let audit = Arc::new(JsonlSink::new(audit_log));

    let (engine, report) = PolicyEngine::open(&config.policies_dir).with_context(|| {
        format!("failed to open policy directory {}", config.policies_dir.display())
    })?;
    let engine = Arc::new(engine.with_strategy(config.match_strategy));
    tracing::info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        strategy = ?config.match_strategy,
        "Policies loaded"
    );

    let watcher = PolicyWatcher::spawn(engine.clone(), &config.policies_dir, config.debounce())
        .context("failed to watch policy directory")?;

    let gateway = Gateway::new(&config.gateway_config(), engine, audit)
        .context("invalid gateway configuration")?;
    for tool in gateway.tools().names() {
        tracing::info!(tool, "Registered tool");
    }
    let app = build_app(Arc::new(gateway));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    tracing::info!(addr = %config.listen, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    watcher.shutdown().await;
    tracing::info!("Aegis gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
