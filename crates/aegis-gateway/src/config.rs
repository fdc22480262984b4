// config.rs — Gateway configuration.
//
// GatewayConfig holds what the request pipeline needs beyond the policy
// engine and audit sink: the tool registry (name → base URL), the outbound
// timeout, and the match strategy the engine should use. The daemon builds
// it from its TOML file; `Default` gives the stock two-tool setup.

use std::collections::BTreeMap;
use std::time::Duration;

use aegis_policy::MatchStrategy;
use serde::{Deserialize, Serialize};

/// Default outbound timeout for forwarded tool calls.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the tool-call gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Tool name → base URL. A call to `/tools/{tool}/{action}` is forwarded
    /// to `POST {base}/{action}`.
    pub tools: BTreeMap<String, String>,

    /// Upper bound on one forwarded call, connect through body.
    pub forward_timeout_secs: u64,

    /// Rule applied when a matching allowance fails its conditions.
    pub match_strategy: MatchStrategy,
}

impl GatewayConfig {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tools: default_tools(),
            forward_timeout_secs: DEFAULT_FORWARD_TIMEOUT.as_secs(),
            match_strategy: MatchStrategy::default(),
        }
    }
}

/// The stock tool registry.
pub fn default_tools() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("payments".to_string(), "http://localhost:8081".to_string()),
        ("files".to_string(), "http://localhost:8082".to_string()),
    ])
}
