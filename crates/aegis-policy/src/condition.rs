// condition.rs — Typed allowance conditions.
//
// Policy documents carry conditions as a free-form YAML mapping. At load time
// each recognized key is normalized into a `Condition` variant, so evaluation
// never re-inspects raw YAML types on the request path.
//
// A condition constrains a request parameter only when that parameter is
// present. An absent parameter passes vacuously.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::LoadError;

/// Request parameters, as parsed from the inbound JSON object.
pub type Params = serde_json::Map<String, Value>;

/// Condition key constraining `params.amount`.
pub const MAX_AMOUNT: &str = "max_amount";
/// Condition key constraining `params.currency`.
pub const CURRENCIES: &str = "currencies";
/// Condition key constraining `params.path`.
pub const FOLDER_PREFIX: &str = "folder_prefix";

/// A single normalized condition attached to a tool allowance.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `params.amount` must not exceed this bound.
    MaxAmount(f64),
    /// `params.currency` must be one of these codes (case-sensitive).
    Currencies(BTreeSet<String>),
    /// `params.path` must start with this prefix (byte-for-byte).
    FolderPrefix(String),
}

impl Condition {
    /// The policy-document key this condition was parsed from.
    pub fn kind(&self) -> &'static str {
        match self {
            Condition::MaxAmount(_) => MAX_AMOUNT,
            Condition::Currencies(_) => CURRENCIES,
            Condition::FolderPrefix(_) => FOLDER_PREFIX,
        }
    }

    /// Check this condition against the request parameters.
    ///
    /// The error string is the denial reason. It names the configured bound,
    /// never the full parameter payload.
    pub fn check(&self, params: &Params) -> Result<(), String> {
        match self {
            Condition::MaxAmount(max) => {
                let Some(amount) = params.get("amount") else {
                    return Ok(());
                };
                let amount = amount
                    .as_f64()
                    .ok_or_else(|| "amount must be a number".to_string())?;
                if amount > *max {
                    return Err(format!("Amount exceeds max_amount={}", max));
                }
                Ok(())
            }
            Condition::Currencies(allowed) => {
                let Some(currency) = params.get("currency") else {
                    return Ok(());
                };
                let currency = currency
                    .as_str()
                    .ok_or_else(|| "currency must be a string".to_string())?;
                if !allowed.contains(currency) {
                    let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
                    return Err(format!(
                        "Currency not in allowed currencies [{}]",
                        allowed.join(", ")
                    ));
                }
                Ok(())
            }
            Condition::FolderPrefix(prefix) => {
                let Some(path) = params.get("path") else {
                    return Ok(());
                };
                let path = path
                    .as_str()
                    .ok_or_else(|| "path must be a string".to_string())?;
                if !path.as_bytes().starts_with(prefix.as_bytes()) {
                    return Err(format!("Path must start with prefix {}", prefix));
                }
                Ok(())
            }
        }
    }
}

/// Check every condition in order, returning the first failure.
pub fn check_all(conditions: &[Condition], params: &Params) -> Result<(), String> {
    conditions.iter().try_for_each(|c| c.check(params))
}

/// Normalize a raw YAML condition mapping.
///
/// Recognized keys are returned in a fixed order (max_amount, currencies,
/// folder_prefix). Unknown keys are ignored so newer documents still load on
/// older gateways. A recognized key with the wrong value shape is an error.
pub fn normalize(raw: &BTreeMap<String, serde_yaml::Value>) -> Result<Vec<Condition>, LoadError> {
    let mut conditions = Vec::new();

    if let Some(value) = raw.get(MAX_AMOUNT) {
        let max = value
            .as_f64()
            .filter(|m| m.is_finite())
            .ok_or_else(|| LoadError::Invalid("max_amount must be a number".to_string()))?;
        conditions.push(Condition::MaxAmount(max));
    }

    if let Some(value) = raw.get(CURRENCIES) {
        let invalid = || LoadError::Invalid("currencies must be a list of strings".to_string());
        let items = value.as_sequence().ok_or_else(invalid)?;
        let codes = items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<Result<BTreeSet<_>, _>>()?;
        conditions.push(Condition::Currencies(codes));
    }

    if let Some(value) = raw.get(FOLDER_PREFIX) {
        let prefix = value
            .as_str()
            .ok_or_else(|| LoadError::Invalid("folder_prefix must be a string".to_string()))?;
        conditions.push(Condition::FolderPrefix(prefix.to_string()));
    }

    for key in raw.keys() {
        if ![MAX_AMOUNT, CURRENCIES, FOLDER_PREFIX].contains(&key.as_str()) {
            tracing::debug!(condition = %key, "ignoring unrecognized condition");
        }
    }

    Ok(conditions)
}
