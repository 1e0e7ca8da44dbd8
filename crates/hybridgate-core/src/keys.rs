//! Deterministic request and cache identifiers.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::category::RequestCategory;

const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// SHA-256 hex digest of the canonical JSON form of `payload`.
pub fn payload_hash(payload: &Value) -> String {
    let canonical = canonical_json(payload);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Serializes `value` with object keys sorted and integral floats written as integers,
/// so semantically identical payloads produce identical bytes.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => match number.as_f64() {
            Some(float)
                if number.is_f64() && float.fract() == 0.0 && float.abs() < MAX_EXACT_INTEGER =>
            {
                out.push_str(&(float as i64).to_string());
            }
            _ => {
                out.push_str(&number.to_string());
            }
        },
        Value::String(text) => write_string(text, out),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|left, right| left.0.cmp(right.0));
            out.push('{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

fn write_string(text: &str, out: &mut String) {
    // Serializing a &str cannot fail.
    match serde_json::to_string(text) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("\"\""),
    }
}

/// Cache address: category plus payload hash, independent of time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(category: RequestCategory, payload: &Value) -> Self {
        Self::from_hash(category, &payload_hash(payload))
    }

    pub fn from_hash(category: RequestCategory, hash: &str) -> Self {
        Self(format!("{}_{hash}", category.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracing identifier: category, millisecond timestamp bucket and a short payload hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn derive(category: RequestCategory, payload: &Value, at: OffsetDateTime) -> Self {
        Self::from_hash(category, &payload_hash(payload), at)
    }

    pub fn from_hash(category: RequestCategory, hash: &str, at: OffsetDateTime) -> Self {
        Self::labelled(category.as_str(), hash, at)
    }

    /// Same layout under an arbitrary prefix, for requests whose category did not parse.
    pub fn labelled(label: &str, hash: &str, at: OffsetDateTime) -> Self {
        let bucket = at.unix_timestamp_nanos() / 1_000_000;
        let short = hash.get(..8).unwrap_or(hash);
        Self(format!("{label}_{bucket}_{short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn canonical_form_sorts_keys_recursively() {
        let value = json!({ "b": { "y": 1, "x": [true, null] }, "a": "q\"uote" });
        assert_eq!(
            canonical_json(&value),
            r#"{"a":"q\"uote","b":{"x":[true,null],"y":1}}"#
        );
    }

    #[test]
    fn integral_floats_hash_like_integers() {
        let as_int = json!({ "filters": { "min_value": 500000 } });
        let as_float = json!({ "filters": { "min_value": 500000.0 } });
        assert_eq!(payload_hash(&as_int), payload_hash(&as_float));
        assert_ne!(
            payload_hash(&as_int),
            payload_hash(&json!({ "filters": { "min_value": 500000.5 } }))
        );
    }

    #[test]
    fn cache_key_ignores_key_order() {
        let left = json!({ "target_key": "90210", "filters": { "min_value": 1 } });
        let right = json!({ "filters": { "min_value": 1 }, "target_key": "90210" });
        assert_eq!(
            CacheKey::derive(RequestCategory::PropertySearch, &left),
            CacheKey::derive(RequestCategory::PropertySearch, &right)
        );
        assert_ne!(
            CacheKey::derive(RequestCategory::PropertySearch, &left),
            CacheKey::derive(RequestCategory::MarketAnalysis, &left)
        );
    }

    #[test]
    fn request_id_depends_on_time_bucket() {
        let payload = json!({ "target_key": "90210" });
        let first = RequestId::derive(
            RequestCategory::PropertySearch,
            &payload,
            datetime!(2026-10-14 10:00:00.000 UTC),
        );
        let same = RequestId::derive(
            RequestCategory::PropertySearch,
            &payload,
            datetime!(2026-10-14 10:00:00.000 UTC),
        );
        let later = RequestId::derive(
            RequestCategory::PropertySearch,
            &payload,
            datetime!(2026-10-14 10:00:00.250 UTC),
        );

        assert_eq!(first, same);
        assert_ne!(first, later);
        assert!(first.as_str().starts_with("property_search_"));
    }
}
