//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! enums with explicit discriminants. Conversion functions live here to keep
//! `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use netkit_core::{HttpMethod, HttpRequest, NetworkError};

/// Opaque handle to a `RequestPipeline`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiPipeline {
    pub(crate) inner: netkit_core::RequestPipeline,
}

/// Copy `s` into a heap C string owned by the caller. Interior NULs are
/// dropped.
pub(crate) fn to_c_string(s: impl Into<String>) -> *mut c_char {
    let mut s = s.into();
    s.retain(|c| c != '\0');
    CString::new(s).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Delete => HttpMethod::Delete,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `netkit_build_request`. The host executes the request and passes
/// the response back through `netkit_parse_response`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: HttpRequest) -> *mut Self {
        let url = to_c_string(req.url);
        let body = match req.body {
            Some(b) => to_c_string(b),
            None => std::ptr::null_mut(),
        };

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: to_c_string(k),
                    value: to_c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url,
            headers,
            headers_len,
            body,
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The host constructs this after executing a request and passes a pointer
/// to `netkit_parse_response`. The FFI layer reads but does not free these
/// fields. A null `body` is an empty body.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiNetResult` and by `netkit_build_request`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    InvalidUrl = 1,
    NoResponse = 2,
    Decode = 3,
    ServerError = 4,
    NoInternet = 5,
    Transport = 6,
    InvalidInput = 7,
    NullArg = 8,
    Panic = 9,
}

impl From<&NetworkError> for FfiErrorCode {
    fn from(err: &NetworkError) -> Self {
        match err {
            NetworkError::InvalidUrl => FfiErrorCode::InvalidUrl,
            NetworkError::NoResponse => FfiErrorCode::NoResponse,
            NetworkError::Decode(_) => FfiErrorCode::Decode,
            NetworkError::ServerError(_) => FfiErrorCode::ServerError,
            NetworkError::NoInternet(_) => FfiErrorCode::NoInternet,
            NetworkError::Transport(_) => FfiErrorCode::Transport,
        }
    }
}

/// Result envelope for `netkit_parse_response`.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `body` is
/// the decoded JSON re-serialized, or null when no body was expected.
/// On failure `error_code` describes the category, `error_message` carries
/// the error's message, and `body` is null.
#[repr(C)]
pub struct FfiNetResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub body: *mut c_char,
}

impl FfiNetResult {
    fn boxed(error_code: FfiErrorCode, error_message: *mut c_char, body: *mut c_char) -> *mut Self {
        Box::into_raw(Box::new(FfiNetResult {
            error_code,
            error_message,
            body,
        }))
    }

    /// Build a success result carrying a JSON document.
    pub(crate) fn ok_json(value: &serde_json::Value) -> *mut Self {
        Self::boxed(FfiErrorCode::Ok, std::ptr::null_mut(), to_c_string(value.to_string()))
    }

    /// Build a success result with no body (ignored success response).
    pub(crate) fn ok_empty() -> *mut Self {
        Self::boxed(FfiErrorCode::Ok, std::ptr::null_mut(), std::ptr::null_mut())
    }

    /// Build an error result from a `NetworkError`.
    ///
    /// `ServerError`, `Decode` and `NoInternet` carry their message verbatim
    /// so hosts can localize the key.
    pub(crate) fn from_error(err: &NetworkError) -> *mut Self {
        let message = match err {
            NetworkError::ServerError(m) | NetworkError::Decode(m) | NetworkError::NoInternet(m) => m.clone(),
            other => other.to_string(),
        };
        Self::boxed(err.into(), to_c_string(message), std::ptr::null_mut())
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::NullArg, to_c_string(format!("null argument: {name}")), std::ptr::null_mut())
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::Panic, to_c_string(msg), std::ptr::null_mut())
    }
}
