//! Deterministic cache keys
//!
//! A key is `METHOD url?{params}#digest`, where params are rendered as
//! canonical JSON (object keys sorted recursively) and the body contributes a
//! truncated BLAKE3 digest of its canonical form. Two logically identical
//! requests always produce the same key whatever their key order.

use std::fmt;

use serde_json::Value;
use tether_domain::{HttpMethod, RequestDescriptor};

/// Hex characters of the body digest kept in the key
const BODY_DIGEST_LEN: usize = 32;

/// Cache key derived from a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        method: HttpMethod,
        url: &str,
        params: Option<&Value>,
        body: Option<&Value>,
    ) -> Self {
        let mut key = format!("{method} {url}");

        if let Some(params) = params.filter(|p| !is_empty(p)) {
            key.push('?');
            write_canonical(params, &mut key);
        }

        if let Some(body) = body.filter(|b| !is_empty(b)) {
            let mut canonical = String::new();
            write_canonical(body, &mut canonical);
            let digest = blake3::hash(canonical.as_bytes()).to_hex();
            key.push('#');
            key.push_str(&digest[..BODY_DIGEST_LEN]);
        }

        Self(key)
    }

    pub fn for_request(descriptor: &RequestDescriptor) -> Self {
        Self::new(
            descriptor.method,
            &descriptor.url,
            descriptor.params.as_ref(),
            descriptor.body.as_ref(),
        )
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

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Render `value` as compact JSON with object keys sorted at every level
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (name, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
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
        scalar => out.push_str(&scalar.to_string()),
    }
}
