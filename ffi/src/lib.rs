//! C-ABI wrapper around `bridge-core`.
//!
//! # Overview
//! Lets an engine written in C or C++ host the bridge: register schemes and
//! C route callbacks, hand intercepted requests over with a callback table
//! for the pending transaction, and make direct call-ins that return the
//! serialized response envelope.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Builder functions return an `FfiErrorCode`; constructors return null on
//!   failure.
//! - Pointers handed *to* C callbacks are borrowed for the duration of the
//!   call. Pointers *returned* to C are owned by the caller and released
//!   with the matching `bridge_*free*` function.

pub mod types;

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use bridge_core::{BridgeBuilder, BridgeConfig, HandlerError, InterceptDecision, RequestDescriptor};

use types::*;

/// Borrow a C string argument as UTF-8.
fn str_arg<'a>(ptr: *const c_char) -> Result<&'a str, FfiErrorCode> {
    if ptr.is_null() {
        return Err(FfiErrorCode::NullArg);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiErrorCode::InvalidUtf8)
}

/// Parse an optional JSON argument. Null means "absent".
fn json_arg(ptr: *const c_char) -> Result<Option<serde_json::Value>, FfiErrorCode> {
    if ptr.is_null() {
        return Ok(None);
    }
    let text = str_arg(ptr)?;
    serde_json::from_str(text)
        .map(Some)
        .map_err(|_| FfiErrorCode::InvalidJson)
}

fn code_of(result: Result<(), FfiErrorCode>) -> FfiErrorCode {
    result.err().unwrap_or(FfiErrorCode::Ok)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Start a bridge configuration from the `BRIDGE_*` environment.
///
/// Returns null if the environment holds a malformed value or an internal
/// panic occurs. Release with `bridge_builder_build` or `bridge_builder_free`.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_builder_new() -> *mut FfiBridgeBuilder {
    catch_unwind(|| match BridgeConfig::from_env() {
        Ok(config) => Box::into_raw(Box::new(FfiBridgeBuilder {
            inner: BridgeBuilder::new(config),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "rejecting bridge configuration");
            std::ptr::null_mut()
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a builder that was never built. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_builder_free(builder: *mut FfiBridgeBuilder) {
    if !builder.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(builder) });
        }));
    }
}

/// Register a URL scheme. `domain` may be null to match any host.
///
/// Returns `Duplicate` if the same name and domain are already registered
/// and `InvalidArgument` for an empty name or `FfiSchemeType::None`.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_builder_add_scheme(
    builder: *mut FfiBridgeBuilder,
    name: *const c_char,
    domain: *const c_char,
    scheme_type: FfiSchemeType,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        code_of(register_scheme(builder, name, domain, scheme_type))
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

fn register_scheme(
    builder: *mut FfiBridgeBuilder,
    name: *const c_char,
    domain: *const c_char,
    scheme_type: FfiSchemeType,
) -> Result<(), FfiErrorCode> {
    if builder.is_null() {
        return Err(FfiErrorCode::NullArg);
    }
    let builder = unsafe { &mut *builder };
    let name = str_arg(name)?;
    let domain = if domain.is_null() { "" } else { str_arg(domain)? };
    let scheme_type = scheme_type.to_core().ok_or(FfiErrorCode::InvalidArgument)?;
    builder
        .inner
        .add_scheme(name, domain, scheme_type)
        .map_err(|e| FfiErrorCode::from(&e))
}

/// Register a route implemented by `callback`.
///
/// `callback` runs on bridge worker threads, possibly several at once, with
/// `user_data` passed through untouched. `Async` routes run on the blocking
/// pool and do not hold up other async routes.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_builder_add_route(
    builder: *mut FfiBridgeBuilder,
    path: *const c_char,
    mode: FfiExecutionMode,
    callback: Option<FfiRouteCallback>,
    user_data: *mut c_void,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        code_of(register_route(builder, path, mode, callback, user_data))
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

fn register_route(
    builder: *mut FfiBridgeBuilder,
    path: *const c_char,
    mode: FfiExecutionMode,
    callback: Option<FfiRouteCallback>,
    user_data: *mut c_void,
) -> Result<(), FfiErrorCode> {
    if builder.is_null() {
        return Err(FfiErrorCode::NullArg);
    }
    let builder = unsafe { &mut *builder };
    let path = str_arg(path)?;
    let callback = callback.ok_or(FfiErrorCode::NullArg)?;
    let handler = CRoute::new(callback, user_data).into_handler(mode.into());
    builder
        .inner
        .add_route(path, handler)
        .map_err(|e| FfiErrorCode::from(&e))
}

/// Build the bridge. Always consumes `builder`, even on failure.
///
/// Returns null if `builder` is null or the worker runtime cannot start.
/// Release with `bridge_free`.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_builder_build(builder: *mut FfiBridgeBuilder) -> *mut FfiBridge {
    if builder.is_null() {
        return std::ptr::null_mut();
    }
    catch_unwind(AssertUnwindSafe(|| {
        let builder = unsafe { Box::from_raw(builder) };
        match builder.inner.build() {
            Ok(bridge) => Box::into_raw(Box::new(FfiBridge { inner: bridge })),
            Err(e) => {
                tracing::error!(error = %e, "bridge build failed");
                std::ptr::null_mut()
            }
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Classify `url` against the registered schemes.
///
/// Returns `FfiSchemeType::None` for unmatched, unparsable or null input.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_classify(bridge: *const FfiBridge, url: *const c_char) -> FfiSchemeType {
    catch_unwind(AssertUnwindSafe(|| {
        if bridge.is_null() {
            return FfiSchemeType::None;
        }
        let bridge = unsafe { &*bridge };
        let Ok(url) = str_arg(url) else {
            return FfiSchemeType::None;
        };
        bridge
            .inner
            .schemes()
            .classify(url)
            .map_or(FfiSchemeType::None, |s| s.scheme_type().into())
    }))
    .unwrap_or(FfiSchemeType::None)
}

/// Offer an intercepted request to the bridge.
///
/// On `ContinueAsync` the bridge calls exactly one of `callbacks.complete`
/// or `callbacks.cancel` later, from a worker thread (or neither, if
/// `callbacks.is_alive` reports the transaction gone). On `PassThrough` and
/// `Rejected` no callback is ever invoked and the engine keeps ownership of
/// its transaction.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_begin_intercept(
    bridge: *const FfiBridge,
    request: *const FfiRequestDescriptor,
    callbacks: FfiTransactionCallbacks,
) -> FfiInterceptResult {
    catch_unwind(AssertUnwindSafe(|| {
        if bridge.is_null() || request.is_null() {
            return FfiInterceptResult::rejected(FfiErrorCode::NullArg);
        }
        let bridge = unsafe { &*bridge };
        let request = unsafe { &*request };
        let Some(transaction) = CTransaction::from_callbacks(&callbacks) else {
            return FfiInterceptResult::rejected(FfiErrorCode::NullArg);
        };
        let descriptor = match descriptor_from_ffi(request) {
            Ok(d) => d,
            Err(code) => return FfiInterceptResult::rejected(code),
        };
        match bridge.inner.begin_intercept(descriptor, transaction) {
            InterceptDecision::ContinueAsync(mode) => FfiInterceptResult {
                decision: FfiDecision::ContinueAsync,
                mode: mode.into(),
                error_code: FfiErrorCode::Ok,
            },
            InterceptDecision::PassThrough(_) => FfiInterceptResult {
                decision: FfiDecision::PassThrough,
                mode: FfiExecutionMode::Sync,
                error_code: FfiErrorCode::Ok,
            },
        }
    }))
    .unwrap_or(FfiInterceptResult::rejected(FfiErrorCode::Panic))
}

fn descriptor_from_ffi(request: &FfiRequestDescriptor) -> Result<RequestDescriptor, FfiErrorCode> {
    let url = str_arg(request.url)?;
    let method = if request.method.is_null() {
        "GET"
    } else {
        str_arg(request.method)?
    };
    let post_data = if request.post_data.is_null() || request.post_data_len == 0 {
        None
    } else {
        let bytes = unsafe { std::slice::from_raw_parts(request.post_data, request.post_data_len) };
        Some(bytes.to_vec())
    };
    Ok(RequestDescriptor {
        identifier: request.identifier,
        url: url.to_string(),
        method: method.to_string(),
        post_data,
    })
}

/// Direct call-in: route `path` and return the serialized response.
///
/// `parameters_json` (an object) and `post_data_json` may be null. Blocks
/// until the route finishes, so never call it from an engine thread that a
/// route depends on. Returns null on null `path`, invalid JSON arguments or
/// a panic. Release the string with `bridge_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_invoke(
    bridge: *const FfiBridge,
    path: *const c_char,
    parameters_json: *const c_char,
    post_data_json: *const c_char,
) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if bridge.is_null() {
            return std::ptr::null_mut();
        }
        let bridge = unsafe { &*bridge };
        let (Ok(path), Ok(parameters), Ok(post_data)) = (
            str_arg(path),
            json_arg(parameters_json),
            json_arg(post_data_json),
        ) else {
            return std::ptr::null_mut();
        };
        let text = bridge.inner.call(path, parameters, post_data);
        c_string(&text).into_raw()
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Replies from C routes
// ---------------------------------------------------------------------------

/// Store a successful JSON result for the current route call.
///
/// Invalid JSON stores a handler failure instead and returns `InvalidJson`.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_reply_set_json(reply: *mut FfiReply, json: *const c_char) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if reply.is_null() {
            return FfiErrorCode::NullArg;
        }
        let reply = unsafe { &mut *reply };
        let text = match str_arg(json) {
            Ok(t) => t,
            Err(code) => {
                reply.result = Some(Err(HandlerError::new("route returned no JSON text")));
                return code;
            }
        };
        match serde_json::from_str(text) {
            Ok(value) => {
                reply.result = Some(Ok(value));
                FfiErrorCode::Ok
            }
            Err(e) => {
                reply.result = Some(Err(HandlerError::from(e)));
                FfiErrorCode::InvalidJson
            }
        }
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Mark the current route call as failed. `message` is logged, never shown
/// to script; it may be null.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_reply_set_error(reply: *mut FfiReply, message: *const c_char) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if reply.is_null() {
            return FfiErrorCode::NullArg;
        }
        let reply = unsafe { &mut *reply };
        let message = str_arg(message).unwrap_or("route reported an error");
        reply.result = Some(Err(HandlerError::new(message)));
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a bridge built by `bridge_builder_build`. Safe to call with null.
///
/// Waits for the owned worker runtime to shut down; call it from an engine
/// thread, never from inside a route callback.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_free(bridge: *mut FfiBridge) {
    if !bridge.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(bridge) });
        }));
    }
}

/// Free a C string returned by `bridge_invoke`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn bridge_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { std::ffi::CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Debug)]
    enum Seen {
        Completed {
            status: u16,
            mime_type: String,
            headers_len: u32,
            body: String,
        },
        Cancelled,
    }

    type Sink = mpsc::Sender<Seen>;

    extern "C" fn on_complete(user_data: *mut c_void, info: *const FfiResponseInfo) {
        let tx = unsafe { Box::from_raw(user_data as *mut Sink) };
        let info = unsafe { &*info };
        let body = unsafe { std::slice::from_raw_parts(info.body, info.body_len as usize) };
        let mime_type = unsafe { CStr::from_ptr(info.mime_type) }
            .to_string_lossy()
            .into_owned();
        let _ = tx.send(Seen::Completed {
            status: info.status,
            mime_type,
            headers_len: info.headers_len,
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    extern "C" fn on_cancel(user_data: *mut c_void) {
        let tx = unsafe { Box::from_raw(user_data as *mut Sink) };
        let _ = tx.send(Seen::Cancelled);
    }

    extern "C" fn never_alive(_user_data: *mut c_void) -> bool {
        false
    }

    extern "C" fn ping_route(_: *mut c_void, _: *const FfiRouteRequest, reply: *mut FfiReply) {
        let json = CString::new(r#"{"pong":true}"#).unwrap();
        bridge_reply_set_json(reply, json.as_ptr());
    }

    /// Echoes the path, parameters and post body back as JSON.
    extern "C" fn echo_route(_: *mut c_void, request: *const FfiRouteRequest, reply: *mut FfiReply) {
        let request = unsafe { &*request };
        let path = unsafe { CStr::from_ptr(request.path) }.to_str().unwrap();
        let params = if request.parameters.is_null() {
            &[][..]
        } else {
            unsafe { std::slice::from_raw_parts(request.parameters, request.parameters_len as usize) }
        };
        let mut object = serde_json::Map::new();
        for p in params {
            let k = unsafe { CStr::from_ptr(p.key) }.to_str().unwrap();
            let v = unsafe { CStr::from_ptr(p.value) }.to_str().unwrap();
            object.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        let post = if request.post_data_json.is_null() {
            serde_json::Value::Null
        } else {
            let text = unsafe { CStr::from_ptr(request.post_data_json) }.to_str().unwrap();
            serde_json::from_str(text).unwrap()
        };
        let out = serde_json::json!({"path": path, "params": object, "post": post});
        let json = CString::new(out.to_string()).unwrap();
        bridge_reply_set_json(reply, json.as_ptr());
    }

    extern "C" fn failing_route(_: *mut c_void, _: *const FfiRouteRequest, reply: *mut FfiReply) {
        let msg = CString::new("database offline").unwrap();
        bridge_reply_set_error(reply, msg.as_ptr());
    }

    extern "C" fn silent_route(_: *mut c_void, _: *const FfiRouteRequest, _: *mut FfiReply) {}

    extern "C" fn bad_json_route(_: *mut c_void, _: *const FfiRouteRequest, reply: *mut FfiReply) {
        let json = CString::new("{not json").unwrap();
        assert_eq!(bridge_reply_set_json(reply, json.as_ptr()), FfiErrorCode::InvalidJson);
    }

    extern "C" fn counting_route(user_data: *mut c_void, _: *const FfiRouteRequest, reply: *mut FfiReply) {
        let counter = unsafe { &*(user_data as *const AtomicUsize) };
        counter.fetch_add(1, Ordering::SeqCst);
        let json = CString::new("null").unwrap();
        bridge_reply_set_json(reply, json.as_ptr());
    }

    fn add_route(
        builder: *mut FfiBridgeBuilder,
        path: &str,
        mode: FfiExecutionMode,
        callback: FfiRouteCallback,
        user_data: *mut c_void,
    ) -> FfiErrorCode {
        let path = CString::new(path).unwrap();
        bridge_builder_add_route(builder, path.as_ptr(), mode, Some(callback), user_data)
    }

    fn test_bridge() -> *mut FfiBridge {
        let builder = bridge_builder_new();
        assert!(!builder.is_null());
        let name = CString::new("http").unwrap();
        let domain = CString::new("command.com").unwrap();
        assert_eq!(
            bridge_builder_add_scheme(builder, name.as_ptr(), domain.as_ptr(), FfiSchemeType::LocalRequest),
            FfiErrorCode::Ok
        );
        let local = CString::new("local").unwrap();
        assert_eq!(
            bridge_builder_add_scheme(builder, local.as_ptr(), std::ptr::null(), FfiSchemeType::LocalResource),
            FfiErrorCode::Ok
        );
        let null = std::ptr::null_mut();
        assert_eq!(add_route(builder, "/ping", FfiExecutionMode::Sync, ping_route, null), FfiErrorCode::Ok);
        assert_eq!(add_route(builder, "/echo", FfiExecutionMode::Async, echo_route, null), FfiErrorCode::Ok);
        assert_eq!(add_route(builder, "/fail", FfiExecutionMode::Async, failing_route, null), FfiErrorCode::Ok);
        assert_eq!(add_route(builder, "/silent", FfiExecutionMode::Sync, silent_route, null), FfiErrorCode::Ok);
        assert_eq!(add_route(builder, "/badjson", FfiExecutionMode::Sync, bad_json_route, null), FfiErrorCode::Ok);
        let bridge = bridge_builder_build(builder);
        assert!(!bridge.is_null());
        bridge
    }

    fn invoke(bridge: *mut FfiBridge, path: &str, params: Option<&str>, post: Option<&str>) -> serde_json::Value {
        let path = CString::new(path).unwrap();
        let params = params.map(|p| CString::new(p).unwrap());
        let post = post.map(|p| CString::new(p).unwrap());
        let out = bridge_invoke(
            bridge,
            path.as_ptr(),
            params.as_ref().map_or(std::ptr::null(), |p| p.as_ptr()),
            post.as_ref().map_or(std::ptr::null(), |p| p.as_ptr()),
        );
        assert!(!out.is_null());
        let text = unsafe { CStr::from_ptr(out) }.to_str().unwrap().to_string();
        bridge_free_string(out);
        serde_json::from_str(&text).unwrap()
    }

    fn callbacks(tx: Sink) -> FfiTransactionCallbacks {
        FfiTransactionCallbacks {
            user_data: Box::into_raw(Box::new(tx)) as *mut c_void,
            complete: Some(on_complete),
            cancel: Some(on_cancel),
            is_alive: None,
        }
    }

    fn descriptor(url: &CString) -> FfiRequestDescriptor {
        FfiRequestDescriptor {
            identifier: 7,
            url: url.as_ptr(),
            method: std::ptr::null(),
            post_data: std::ptr::null(),
            post_data_len: 0,
        }
    }

    #[test]
    fn builder_new_and_free() {
        let builder = bridge_builder_new();
        assert!(!builder.is_null());
        bridge_builder_free(builder);
    }

    #[test]
    fn free_functions_accept_null() {
        bridge_builder_free(std::ptr::null_mut());
        bridge_free(std::ptr::null_mut());
        bridge_free_string(std::ptr::null_mut());
        assert!(bridge_builder_build(std::ptr::null_mut()).is_null());
    }

    #[test]
    fn builder_reports_bad_arguments() {
        let builder = bridge_builder_new();
        let name = CString::new("http").unwrap();
        let empty = CString::new("").unwrap();
        assert_eq!(
            bridge_builder_add_scheme(std::ptr::null_mut(), name.as_ptr(), std::ptr::null(), FfiSchemeType::LocalRequest),
            FfiErrorCode::NullArg
        );
        assert_eq!(
            bridge_builder_add_scheme(builder, std::ptr::null(), std::ptr::null(), FfiSchemeType::LocalRequest),
            FfiErrorCode::NullArg
        );
        assert_eq!(
            bridge_builder_add_scheme(builder, empty.as_ptr(), std::ptr::null(), FfiSchemeType::LocalRequest),
            FfiErrorCode::InvalidArgument
        );
        assert_eq!(
            bridge_builder_add_scheme(builder, name.as_ptr(), std::ptr::null(), FfiSchemeType::None),
            FfiErrorCode::InvalidArgument
        );
        assert_eq!(
            bridge_builder_add_scheme(builder, name.as_ptr(), std::ptr::null(), FfiSchemeType::LocalRequest),
            FfiErrorCode::Ok
        );
        assert_eq!(
            bridge_builder_add_scheme(builder, name.as_ptr(), std::ptr::null(), FfiSchemeType::LocalRequest),
            FfiErrorCode::Duplicate
        );

        let path = CString::new("/ping").unwrap();
        assert_eq!(
            bridge_builder_add_route(builder, path.as_ptr(), FfiExecutionMode::Sync, None, std::ptr::null_mut()),
            FfiErrorCode::NullArg
        );
        assert_eq!(
            add_route(builder, "/ping", FfiExecutionMode::Sync, ping_route, std::ptr::null_mut()),
            FfiErrorCode::Ok
        );
        assert_eq!(
            add_route(builder, "/PING/", FfiExecutionMode::Async, ping_route, std::ptr::null_mut()),
            FfiErrorCode::Duplicate
        );
        bridge_builder_free(builder);
    }

    #[test]
    fn classify_reports_scheme_types() {
        let bridge = test_bridge();
        let cases = [
            ("http://command.com/ping", FfiSchemeType::LocalRequest),
            ("local://app/index.html", FfiSchemeType::LocalResource),
            ("https://example.com/", FfiSchemeType::None),
            ("not a url", FfiSchemeType::None),
        ];
        for (url, expected) in cases {
            let url = CString::new(url).unwrap();
            assert_eq!(bridge_classify(bridge, url.as_ptr()), expected);
        }
        assert_eq!(bridge_classify(bridge, std::ptr::null()), FfiSchemeType::None);
        bridge_free(bridge);
    }

    #[test]
    fn invoke_sync_c_route() {
        let bridge = test_bridge();
        let v = invoke(bridge, "/ping", None, None);
        assert_eq!(v["status"], 200);
        assert_eq!(v["data"], serde_json::json!({"pong": true}));
        assert_eq!(v["readyState"], 4);
        bridge_free(bridge);
    }

    #[test]
    fn invoke_async_c_route_sees_parameters_and_body() {
        let bridge = test_bridge();
        let v = invoke(bridge, "/echo", Some(r#"{"q":"rust","page":2}"#), Some(r#"{"x":1}"#));
        assert_eq!(v["status"], 200);
        assert_eq!(v["data"]["path"], "/echo");
        assert_eq!(v["data"]["params"]["q"], "rust");
        assert_eq!(v["data"]["params"]["page"], "2");
        assert_eq!(v["data"]["post"], serde_json::json!({"x": 1}));
        bridge_free(bridge);
    }

    #[test]
    fn invoke_maps_route_failures_to_400() {
        let bridge = test_bridge();
        for path in ["/fail", "/silent", "/badjson"] {
            let v = invoke(bridge, path, None, None);
            assert_eq!(v["status"], 400, "{path}");
            assert_eq!(v["data"], "An error occured.", "{path}");
        }
        assert_eq!(invoke(bridge, "/missing", None, None)["status"], 404);
        bridge_free(bridge);
    }

    #[test]
    fn invoke_rejects_bad_arguments() {
        let bridge = test_bridge();
        let path = CString::new("/ping").unwrap();
        let bad = CString::new("{oops").unwrap();
        assert!(bridge_invoke(std::ptr::null(), path.as_ptr(), std::ptr::null(), std::ptr::null()).is_null());
        assert!(bridge_invoke(bridge, std::ptr::null(), std::ptr::null(), std::ptr::null()).is_null());
        assert!(bridge_invoke(bridge, path.as_ptr(), bad.as_ptr(), std::ptr::null()).is_null());
        bridge_free(bridge);
    }

    #[test]
    fn intercept_completes_through_c_callbacks() {
        let bridge = test_bridge();
        let (tx, rx) = mpsc::channel();
        let url = CString::new("http://command.com/ping").unwrap();
        let result = bridge_begin_intercept(bridge, &descriptor(&url), callbacks(tx));
        assert_eq!(result.decision, FfiDecision::ContinueAsync);
        assert_eq!(result.mode, FfiExecutionMode::Sync);

        let Seen::Completed {
            status,
            mime_type,
            headers_len,
            body,
        } = rx.recv_timeout(Duration::from_secs(5)).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(status, 200);
        assert_eq!(mime_type, "application/json");
        assert_eq!(headers_len, 5);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["data"]["pong"], true);
        bridge_free(bridge);
    }

    #[test]
    fn intercept_post_body_reaches_async_c_route() {
        let bridge = test_bridge();
        let (tx, rx) = mpsc::channel();
        let url = CString::new("http://command.com/echo?id=3").unwrap();
        let method = CString::new("POST").unwrap();
        let body = br#"{"name":"x"}"#;
        let request = FfiRequestDescriptor {
            identifier: 8,
            url: url.as_ptr(),
            method: method.as_ptr(),
            post_data: body.as_ptr(),
            post_data_len: body.len(),
        };
        let result = bridge_begin_intercept(bridge, &request, callbacks(tx));
        assert_eq!(result.mode, FfiExecutionMode::Async);
        let Seen::Completed { body, .. } = rx.recv_timeout(Duration::from_secs(5)).unwrap() else {
            panic!("expected completion");
        };
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["data"]["params"]["id"], "3");
        assert_eq!(v["data"]["post"]["name"], "x");
        bridge_free(bridge);
    }

    #[test]
    fn intercept_failure_cancels() {
        let bridge = test_bridge();
        let (tx, rx) = mpsc::channel();
        let url = CString::new("http://command.com/fail").unwrap();
        let result = bridge_begin_intercept(bridge, &descriptor(&url), callbacks(tx));
        assert_eq!(result.decision, FfiDecision::ContinueAsync);
        assert!(matches!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Seen::Cancelled));
        bridge_free(bridge);
    }

    #[test]
    fn intercept_pass_through_leaves_callbacks_alone() {
        let bridge = test_bridge();
        let (tx, rx) = mpsc::channel();
        let url = CString::new("local://app/index.html").unwrap();
        let cbs = callbacks(tx);
        let result = bridge_begin_intercept(bridge, &descriptor(&url), cbs);
        assert_eq!(result.decision, FfiDecision::PassThrough);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(unsafe { Box::from_raw(cbs.user_data as *mut Sink) });
        bridge_free(bridge);
    }

    #[test]
    fn intercept_rejects_missing_callbacks() {
        let bridge = test_bridge();
        let url = CString::new("http://command.com/ping").unwrap();
        let cbs = FfiTransactionCallbacks {
            user_data: std::ptr::null_mut(),
            complete: None,
            cancel: Some(on_cancel),
            is_alive: None,
        };
        let result = bridge_begin_intercept(bridge, &descriptor(&url), cbs);
        assert_eq!(result.decision, FfiDecision::Rejected);
        assert_eq!(result.error_code, FfiErrorCode::NullArg);

        let result = bridge_begin_intercept(bridge, std::ptr::null(), cbs);
        assert_eq!(result.decision, FfiDecision::Rejected);
        bridge_free(bridge);
    }

    #[test]
    fn disposed_transaction_is_never_written() {
        let bridge = test_bridge();
        let (tx, rx) = mpsc::channel();
        let url = CString::new("http://command.com/ping").unwrap();
        let mut cbs = callbacks(tx);
        cbs.is_alive = Some(never_alive);
        let result = bridge_begin_intercept(bridge, &descriptor(&url), cbs);
        assert_eq!(result.decision, FfiDecision::ContinueAsync);
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        drop(unsafe { Box::from_raw(cbs.user_data as *mut Sink) });
        bridge_free(bridge);
    }

    #[test]
    fn empty_path_does_not_reach_route() {
        let counter = AtomicUsize::new(0);
        let builder = bridge_builder_new();
        let user_data = &counter as *const AtomicUsize as *mut c_void;
        assert_eq!(
            add_route(builder, "/count", FfiExecutionMode::Sync, counting_route, user_data),
            FfiErrorCode::Ok
        );
        let bridge = bridge_builder_build(builder);

        let v = invoke(bridge, "", None, None);
        assert_eq!(v["status"], 400);
        assert_eq!(v["statusText"], "Bad Request");
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert_eq!(invoke(bridge, "/count", None, None)["status"], 200);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        bridge_free(bridge);
    }
}
