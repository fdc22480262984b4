// config.rs — Daemon configuration from aegis.toml.
//
// Every field has a default, so an absent or partial file is fine. CLI flags
// are applied on top by `DaemonConfig::apply_overrides`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aegis_gateway::config::default_tools;
use aegis_gateway::GatewayConfig;
use aegis_policy::{MatchStrategy, DEFAULT_DEBOUNCE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Directory of YAML policy documents (watched for changes).
    #[serde(default = "default_policies_dir")]
    pub policies_dir: PathBuf,

    /// Hash-chained JSONL audit log.
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,

    #[serde(default = "default_forward_timeout_secs")]
    pub forward_timeout_secs: u64,

    /// Quiet period before a changed policy file is reloaded.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub match_strategy: MatchStrategy,

    /// Tool name → base URL.
    #[serde(default = "default_tools")]
    pub tools: BTreeMap<String, String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            policies_dir: default_policies_dir(),
            audit_log: default_audit_log(),
            forward_timeout_secs: default_forward_timeout_secs(),
            debounce_ms: default_debounce_ms(),
            match_strategy: MatchStrategy::default(),
            tools: default_tools(),
        }
    }
}

// Serde default functions
fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_policies_dir() -> PathBuf {
    PathBuf::from("policies")
}

fn default_audit_log() -> PathBuf {
    PathBuf::from("logs/aegis.jsonl")
}

fn default_forward_timeout_secs() -> u64 {
    GatewayConfig::default().forward_timeout_secs
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

/// Values given on the command line; `None` leaves the file value alone.
#[derive(Debug, Default)]
pub struct Overrides {
    pub listen: Option<SocketAddr>,
    pub policies_dir: Option<PathBuf>,
    pub audit_log: Option<PathBuf>,
}

impl DaemonConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(listen) = overrides.listen {
            self.listen = listen;
        }
        if let Some(dir) = overrides.policies_dir {
            self.policies_dir = dir;
        }
        if let Some(log) = overrides.audit_log {
            self.audit_log = log;
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The subset the gateway library needs.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            tools: self.tools.clone(),
            forward_timeout_secs: self.forward_timeout_secs,
            match_strategy: self.match_strategy,
        }
    }
}
