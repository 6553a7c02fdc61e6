//! C-ABI wrapper around `netkit-core`.
//!
//! # Overview
//! Exposes the request pipeline's build and parse halves through
//! `extern "C"` functions so an iOS host can let `URLSession` perform the
//! exchange while Rust owns URL building, parameter encoding, status
//! classification and error decoding.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Headers and parameters cross as JSON object strings and decode into the
//!   core's `Headers`/`Params` maps.
//! - Successful bodies come back as JSON strings; the host decodes them into
//!   its own model types.
//! - The caller owns all returned pointers and must call the matching
//!   `netkit_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use netkit_core::{
    Detached, Expect, Headers, HttpResponse, JsonDecoder, NetworkConfig, Params, Payload, RequestDescriptor,
    RequestPipeline,
};

use types::*;

// ---------------------------------------------------------------------------
// Pipeline lifecycle
// ---------------------------------------------------------------------------

/// Create a pipeline. With `debug` set, every parse is logged through
/// `tracing`.
///
/// Returns null if an internal panic occurs.
/// The caller must free the returned pointer with `netkit_pipeline_free`.
#[unsafe(no_mangle)]
pub extern "C" fn netkit_pipeline_new(debug: bool) -> *mut FfiPipeline {
    catch_unwind(|| {
        let inner = RequestPipeline::from_config(Arc::new(Detached), &NetworkConfig { debug });
        Box::into_raw(Box::new(FfiPipeline { inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a pipeline created by `netkit_pipeline_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn netkit_pipeline_free(pipeline: *mut FfiPipeline) {
    if !pipeline.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(pipeline) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

fn report(out: *mut FfiErrorCode, code: FfiErrorCode) {
    if !out.is_null() {
        unsafe { *out = code };
    }
}

/// Read an optional C string. `Err` means it was not UTF-8.
fn optional_str<'a>(s: *const c_char) -> Result<Option<&'a str>, FfiErrorCode> {
    if s.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map(Some)
        .map_err(|_| FfiErrorCode::InvalidInput)
}

fn optional_json<T: serde::de::DeserializeOwned>(s: *const c_char) -> Result<Option<T>, FfiErrorCode> {
    match optional_str(s)? {
        None => Ok(None),
        Some(json) => serde_json::from_str(json).map_err(|_| FfiErrorCode::InvalidInput),
    }
}

fn descriptor_from_args(
    method: FfiHttpMethod,
    url: *const c_char,
    headers_json: *const c_char,
    params_json: *const c_char,
    form_encoded: bool,
    in_query: bool,
) -> Result<RequestDescriptor, FfiErrorCode> {
    let headers: Headers = optional_json(headers_json)?.unwrap_or_default();
    let params: Option<Params> = optional_json(params_json)?;
    let mut descriptor = RequestDescriptor::new(method.into(), optional_str(url)?)
        .headers(headers)
        .params(params);
    if form_encoded {
        descriptor = descriptor.form_encoded();
    }
    if in_query {
        descriptor = descriptor.in_query();
    }
    Ok(descriptor)
}

/// Build a plain HTTP request.
///
/// `headers_json` and `params_json` are JSON objects or null. Header values
/// that are not strings are dropped. A null `params_json` sends no
/// parameters. With `in_query` the parameters replace the URL's query,
/// otherwise they form the body: form-encoded when `form_encoded` is set,
/// JSON otherwise.
///
/// Returns null on failure. When `error_code` is non-null it receives `Ok`,
/// `NullArg` (null pipeline), `InvalidInput` (non-UTF-8 string or malformed
/// JSON), `InvalidUrl` (missing or unparseable URL) or `Panic`.
/// The caller must free the returned pointer with `netkit_free_request`.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn netkit_build_request(
    pipeline: *const FfiPipeline,
    method: FfiHttpMethod,
    url: *const c_char,
    headers_json: *const c_char,
    params_json: *const c_char,
    form_encoded: bool,
    in_query: bool,
    error_code: *mut FfiErrorCode,
) -> *mut FfiHttpRequest {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        if pipeline.is_null() {
            return Err(FfiErrorCode::NullArg);
        }
        let pipeline = unsafe { &*pipeline };
        let descriptor = descriptor_from_args(method, url, headers_json, params_json, form_encoded, in_query)?;
        pipeline
            .inner
            .build_request(&descriptor)
            .map(FfiHttpRequest::from_core)
            .map_err(|e| FfiErrorCode::from(&e))
    }))
    .unwrap_or(Err(FfiErrorCode::Panic));

    match outcome {
        Ok(request) => {
            report(error_code, FfiErrorCode::Ok);
            request
        }
        Err(code) => {
            report(error_code, code);
            std::ptr::null_mut()
        }
    }
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to a core `HttpResponse`.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        Vec::new()
    } else {
        unsafe { CStr::from_ptr(resp.body) }.to_bytes().to_vec()
    };
    HttpResponse::new(resp.status, body)
}

/// Classify a response the host received.
///
/// A null `response` means the exchange finished without an HTTP response
/// and yields `NoResponse`. With `expect_body` a success body must be JSON
/// and is returned in `body`; without it the success body is ignored.
/// The caller must free the returned pointer with `netkit_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn netkit_parse_response(
    pipeline: *const FfiPipeline,
    response: *const FfiHttpResponse,
    expect_body: bool,
) -> *mut FfiNetResult {
    catch_unwind(AssertUnwindSafe(|| {
        if pipeline.is_null() {
            return FfiNetResult::null_arg("pipeline");
        }
        let pipeline = unsafe { &*pipeline };
        let response = (!response.is_null()).then(|| ffi_response_to_core(unsafe { &*response }));
        let expect = if expect_body { Expect::Body } else { Expect::Empty };
        match pipeline
            .inner
            .parse_response::<serde_json::Value, _>(&JsonDecoder::new(), expect, response)
        {
            Ok(Payload::Decoded(value)) => FfiNetResult::ok_json(&value),
            Ok(Payload::Empty) => FfiNetResult::ok_empty(),
            Err(e) => FfiNetResult::from_error(&e),
        }
    }))
    .unwrap_or_else(|_| FfiNetResult::panic("panic in netkit_parse_response"))
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by `netkit_build_request`. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn netkit_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        if !req.url.is_null() {
            drop(unsafe { CString::from_raw(req.url) });
        }
        if !req.body.is_null() {
            drop(unsafe { CString::from_raw(req.body) });
        }
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(req.headers, req.headers_len as usize))
            };
            for h in headers.iter() {
                if !h.key.is_null() {
                    drop(unsafe { CString::from_raw(h.key) });
                }
                if !h.value.is_null() {
                    drop(unsafe { CString::from_raw(h.value) });
                }
            }
        }
    });
}

/// Free an `FfiNetResult` returned by `netkit_parse_response`. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn netkit_free_result(result: *mut FfiNetResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.body.is_null() {
            drop(unsafe { CString::from_raw(result.body) });
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn netkit_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
