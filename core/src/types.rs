//! Request descriptors, parameter values, and decoded payload shapes.
//!
//! # Design
//! Parameters and headers are maps of `ParamValue`, a closed tagged union, so
//! every encoder matches exhaustively instead of inspecting values at runtime.
//! `BTreeMap` keeps encoding order deterministic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::http::HttpMethod;

/// A scalar or array parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Default formatting: scalars render as themselves, arrays are flattened to
/// a comma-joined string.
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::String(s) => f.write_str(s),
            ParamValue::Int(i) => write!(f, "{i}"),
            // `{:?}` keeps the fractional part: 1.0 renders as "1.0", not "1".
            ParamValue::Float(x) => write!(f, "{x:?}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::Array(values.into_iter().map(Into::into).collect())
    }
}

pub type Params = BTreeMap<String, ParamValue>;

/// Header map. Only `ParamValue::String` entries reach the wire.
pub type Headers = BTreeMap<String, ParamValue>;

/// How body parameters are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` style `key=value&...`.
    Form,
}

/// Where parameters are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPlacement {
    #[default]
    Body,
    Query,
}

/// Everything needed to build one request. Built per call and consumed by it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: HttpMethod,
    url: Option<String>,
    headers: Headers,
    params: Option<Params>,
    encoding: BodyEncoding,
    placement: ParamPlacement,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: Option<&str>) -> Self {
        Self {
            method,
            url: url.map(str::to_string),
            headers: Headers::new(),
            params: None,
            encoding: BodyEncoding::default(),
            placement: ParamPlacement::default(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(HttpMethod::Get, Some(url))
    }

    pub fn post(url: &str) -> Self {
        Self::new(HttpMethod::Post, Some(url))
    }

    pub fn put(url: &str) -> Self {
        Self::new(HttpMethod::Put, Some(url))
    }

    pub fn delete(url: &str) -> Self {
        Self::new(HttpMethod::Delete, Some(url))
    }

    pub fn header(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params
            .get_or_insert_with(Params::new)
            .insert(name.to_string(), value.into());
        self
    }

    /// Replace the parameter map. `None` means "no parameters", which is
    /// distinct from an empty map for JSON bodies (`{}` vs no body).
    pub fn params(mut self, params: Option<Params>) -> Self {
        self.params = params;
        self
    }

    pub fn encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn form_encoded(self) -> Self {
        self.encoding(BodyEncoding::Form)
    }

    pub fn placement(mut self, placement: ParamPlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn in_query(self) -> Self {
        self.placement(ParamPlacement::Query)
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn header_map(&self) -> &Headers {
        &self.headers
    }

    pub fn param_map(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    pub fn body_encoding(&self) -> BodyEncoding {
        self.encoding
    }

    pub fn param_placement(&self) -> ParamPlacement {
        self.placement
    }
}

/// Whether the caller expects a decodable body on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Body,
    /// Succeed without reading the body at all.
    Empty,
}

/// Outcome of a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    Decoded(T),
    Empty,
}

impl<T> Payload<T> {
    pub fn into_decoded(self) -> Option<T> {
        match self {
            Payload::Decoded(value) => Some(value),
            Payload::Empty => None,
        }
    }
}

/// Returned by calls that expect no body content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmptyResponse;

/// Error body returned by the server on non-success statuses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default, rename = "errorMessage", alias = "message")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}
