//! Canonical signing string construction.
//!
//! ```text
//! UPPER(method) | relative_path | normalized_body | timestamp | device
//! ```
//!
//! The path loses its query string and deployment prefix, and JSON bodies
//! are re-serialized compactly with sorted keys, so transport-level
//! differences in whitespace or key order do not change the signature.

use serde_json::{Map, Value};

/// Delimiter between signing string components.
pub const DELIMITER: char = '|';

/// The request parts covered by a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningInput<'a> {
    /// HTTP method, any case.
    pub method: &'a str,
    /// Request path as received (may include the context prefix or a query).
    pub path: &'a str,
    /// Raw request body, if any.
    pub body: Option<&'a [u8]>,
    /// Client timestamp in Unix milliseconds.
    pub timestamp: u64,
    /// Device fingerprint.
    pub device: &'a str,
}

/// Strip the query string and the deployment `context_prefix` from `path`.
///
/// The prefix is only removed when it is a whole leading segment, so
/// `/api` strips `/api/users` but not `/apiary`. The result always starts
/// with `/`.
#[must_use]
pub fn relative_path(path: &str, context_prefix: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let prefix = context_prefix.trim_end_matches('/');

    let stripped = if prefix.is_empty() || prefix == "/" {
        path
    } else if path == prefix {
        ""
    } else {
        match path.strip_prefix(prefix) {
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    };

    if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{stripped}")
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (key, inner) in entries {
                sorted.insert(key, sort_keys(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Canonical form of a JSON value: compact, keys sorted at every level.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value.clone()).to_string()
}

/// Normalize a request body for signing.
///
/// Valid JSON is re-serialized canonically; anything else is used verbatim.
/// An absent body contributes the empty string.
#[must_use]
pub fn canonical_body(body: Option<&[u8]>) -> String {
    match body {
        None | Some([]) => String::new(),
        Some(raw) => match serde_json::from_slice::<Value>(raw) {
            Ok(value) => canonical_json(&value),
            Err(_) => String::from_utf8_lossy(raw).into_owned(),
        },
    }
}

/// Build the exact string the MAC is computed over.
#[must_use]
pub fn build_signing_string(input: &SigningInput<'_>, context_prefix: &str) -> String {
    let mut out = String::with_capacity(64 + input.path.len() + input.body.map_or(0, <[u8]>::len));
    out.push_str(&input.method.to_ascii_uppercase());
    out.push(DELIMITER);
    out.push_str(&relative_path(input.path, context_prefix));
    out.push(DELIMITER);
    out.push_str(&canonical_body(input.body));
    out.push(DELIMITER);
    out.push_str(&input.timestamp.to_string());
    out.push(DELIMITER);
    out.push_str(input.device);
    out
}
