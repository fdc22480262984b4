// model.rs — Policy document model.
//
// A policy document is a YAML file granting agents allowances on tools:
//
// ```yaml
// version: "1.0"
// agents:
//   - id: finance-agent
//     allow:
//       - tool: payments
//         actions: [create, refund]
//         conditions:
//           max_amount: 5000
//           currencies: [USD, EUR]
// ```
//
// The raw serde shape (`*Document` types) is private. Parsing goes through
// `Policy::from_yaml`, which validates and normalizes in one step, so an
// invalid `Policy` value can never be constructed from a file.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::condition::{self, Condition};
use crate::error::LoadError;

/// One parsed and validated policy document.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// Stable identifier of the document's source (its canonical file path).
    pub source_id: String,
    /// Document version. Never empty.
    pub version: String,
    /// Agent grants, in declaration order.
    pub agents: Vec<AgentPolicy>,
}

/// One agent's grants within a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentPolicy {
    pub agent_id: String,
    pub allow: Vec<ToolAllowance>,
}

/// A single (tool, actions, conditions) grant.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolAllowance {
    pub tool: String,
    pub actions: BTreeSet<String>,
    /// Normalized conditions, checked in order. Empty means unconditional.
    pub conditions: Vec<Condition>,
}

impl ToolAllowance {
    /// True if this allowance covers `tool` + `action`.
    pub fn covers(&self, tool: &str, action: &str) -> bool {
        self.tool == tool && self.actions.contains(action)
    }
}

#[derive(Debug, Deserialize)]
struct PolicyDocument {
    /// Read as a string so numeric-looking versions keep their source text.
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    agents: Vec<AgentDocument>,
}

#[derive(Debug, Deserialize)]
struct AgentDocument {
    #[serde(default)]
    id: String,
    #[serde(default)]
    allow: Vec<AllowanceDocument>,
}

#[derive(Debug, Deserialize)]
struct AllowanceDocument {
    #[serde(default)]
    tool: String,
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    conditions: Option<BTreeMap<String, serde_yaml::Value>>,
}

impl Policy {
    /// Parse and validate a policy document.
    pub fn from_yaml(source_id: impl Into<String>, text: &str) -> Result<Self, LoadError> {
        let doc: PolicyDocument = serde_yaml::from_str(text)?;

        let version = doc
            .version
            .filter(|v| !v.is_empty())
            .ok_or_else(|| LoadError::Invalid("policy version is required".to_string()))?;

        let agents = doc
            .agents
            .into_iter()
            .map(AgentPolicy::from_document)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source_id: source_id.into(),
            version,
            agents,
        })
    }

    /// Total number of allowances across all agents.
    pub fn allowance_count(&self) -> usize {
        self.agents.iter().map(|a| a.allow.len()).sum()
    }
}

impl AgentPolicy {
    fn from_document(doc: AgentDocument) -> Result<Self, LoadError> {
        if doc.id.is_empty() {
            return Err(LoadError::Invalid("agent ID is required".to_string()));
        }
        let allow = doc
            .allow
            .into_iter()
            .map(ToolAllowance::from_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            agent_id: doc.id,
            allow,
        })
    }
}

impl ToolAllowance {
    fn from_document(doc: AllowanceDocument) -> Result<Self, LoadError> {
        if doc.tool.is_empty() {
            return Err(LoadError::Invalid("tool name is required".to_string()));
        }
        if doc.actions.is_empty() {
            return Err(LoadError::Invalid(format!(
                "at least one action is required for tool {}",
                doc.tool
            )));
        }
        let conditions = match &doc.conditions {
            Some(raw) => condition::normalize(raw)?,
            None => Vec::new(),
        };
        Ok(Self {
            tool: doc.tool,
            actions: doc.actions.into_iter().collect(),
            conditions,
        })
    }
}
