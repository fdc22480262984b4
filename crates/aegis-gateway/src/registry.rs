// registry.rs — Static tool name → base URL mapping.

use std::collections::BTreeMap;

use reqwest::Url;

use crate::error::GatewayError;

/// Registered downstream tools.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Url>,
}

impl ToolRegistry {
    /// Build a registry, rejecting entries that are not absolute http(s) URLs.
    pub fn new(tools: &BTreeMap<String, String>) -> Result<Self, GatewayError> {
        let mut parsed = BTreeMap::new();
        for (name, base) in tools {
            let invalid = |reason: String| GatewayError::InvalidToolUrl {
                tool: name.clone(),
                reason,
            };
            let url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid(format!("unsupported scheme {}", url.scheme())));
            }
            parsed.insert(name.clone(), url);
        }
        Ok(Self { tools: parsed })
    }

    /// Base URL of `tool`, if registered.
    pub fn get(&self, tool: &str) -> Option<&Url> {
        self.tools.get(tool)
    }

    /// Downstream URL for `action` on `tool`: `{base}/{action}`.
    pub fn target(&self, tool: &str, action: &str) -> Option<String> {
        self.get(tool)
            .map(|base| format!("{}/{}", base.as_str().trim_end_matches('/'), action))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
