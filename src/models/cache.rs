use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 fingerprint of a request's semantic inputs, as 64 lowercase hex chars.
///
/// The fingerprint is order-sensitive: parameters are serialized as a JSON
/// object in exactly the order given, so callers must agree on a fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_params(params: &[(&str, Value)]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(serialize_params(params).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compact JSON object text with keys in call order.
fn serialize_params(params: &[(&str, Value)]) -> String {
    let mut out = String::from("{");
    for (i, (name, value)) in params.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::from(*name).to_string());
        out.push(':');
        out.push_str(&value.to_string());
    }
    out.push('}');
    out
}

/// A memoized payload stored in the cache collection under its fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse {
    pub payload: Value,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub expires_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Only entries expiring strictly after `now` count as hits.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
