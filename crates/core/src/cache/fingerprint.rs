//! Deterministic cache-key derivation for extraction requests.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Identity of one extraction request.
///
/// Two fingerprints are equal iff all five components are equal; the derived
/// `Hash` impl agrees with equality, so a fingerprint can be used directly as
/// a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// SHA-256 of the raw document bytes (never the file path).
    pub content_hash: String,
    /// SHA-256 of the extraction instruction text.
    pub prompt_hash: String,
    /// SHA-256 of the canonical serialization of the expected output shape.
    pub schema_hash: String,
    /// Provider identifier, lowercased.
    pub provider: String,
    /// Model identifier, lowercased; empty when the provider does not
    /// distinguish models.
    pub model: String,
}

impl Fingerprint {
    /// Derive a fingerprint from the raw inputs of an extraction request.
    ///
    /// Each component is hashed independently so that component boundaries
    /// cannot collide (`"ab" + "c"` vs `"a" + "bc"`). The schema is rendered
    /// to sorted-key JSON first; provider and model identity is
    /// case-insensitive. Pure function, no I/O.
    pub fn derive(document: &[u8], prompt: &str, schema: &Value, provider: &str, model: Option<&str>) -> Self {
        Self {
            content_hash: sha256_hex(document),
            prompt_hash: sha256_hex(prompt.as_bytes()),
            schema_hash: sha256_hex(canonical_json(schema).as_bytes()),
            provider: provider.to_lowercase(),
            model: model.unwrap_or("").to_lowercase(),
        }
    }
}

impl std::fmt::Display for Fingerprint {
    /// Canonical string form, used as the persistence identity and for
    /// derived file names.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.content_hash, self.prompt_hash, self.schema_hash, self.provider, self.model
        )
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Render a JSON value with object keys sorted, recursively.
///
/// Logically identical schemas expressed in different construction order
/// produce the same string and therefore the same hash.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<(&String, &Value)> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let fields: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}
