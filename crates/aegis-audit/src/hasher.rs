// hasher.rs — SHA-256 hashing and parameter fingerprints.
//
// All hashes are SHA-256, hex-encoded (64 lowercase characters). The params
// fingerprint hashes a canonical JSON serialization of the request
// parameters: object keys sorted, no insignificant whitespace. Two requests
// with the same parameters in a different key order get the same fingerprint,
// and the raw values never reach the audit trail.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Fingerprint a request parameter object.
pub fn fingerprint(params: &serde_json::Map<String, Value>) -> String {
    let mut out = String::new();
    write_canonical_object(params, &mut out);
    hash_str(&out)
}

/// Canonical JSON text for a value: keys sorted at every depth.
///
/// Does not depend on serde_json's map order (`preserve_order` changes it).
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars already have a single serde_json rendering.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_canonical_object(map: &serde_json::Map<String, Value>, out: &mut String) {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(value, out);
    }
    out.push('}');
}
