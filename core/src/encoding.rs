//! Parameter encoders for query strings, form bodies, and JSON bodies.
//!
//! Keys and scalar values are percent-escaped with `urlencoding`, which keeps
//! only the RFC 3986 unreserved set (`A-Z a-z 0-9 - . _ ~`) literal, so a space
//! becomes `%20`. Array values are flattened with a literal `,` between the
//! individually escaped elements: `{"ids": [1,2,3]}` encodes as `ids=1,2,3`
//! while a comma inside an element is still escaped as `%2C`.

use crate::types::{ParamValue, Params};

/// Encode `params` as `key=value` pairs joined with `&`.
///
/// Shared by query placement and form bodies.
pub fn encode_pairs(params: &Params) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), encode_value(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Array(items) => items.iter().map(encode_value).collect::<Vec<_>>().join(","),
        scalar => urlencoding::encode(&scalar.to_string()).into_owned(),
    }
}

/// Encode `params` as a JSON object.
///
/// Returns `None` only if serialization fails, in which case the request is
/// sent without a body.
pub fn encode_json(params: &Params) -> Option<String> {
    match serde_json::to_string(params) {
        Ok(body) => Some(body),
        Err(e) => {
            tracing::warn!(error = %e, "dropping unserializable JSON body");
            None
        }
    }
}
