//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible representations: borrowed
//! `*const c_char` for strings, pointer + length for byte buffers and
//! key/value lists, and enums with explicit discriminants. The engine side
//! is expressed as two callback tables: `FfiTransactionCallbacks` answers one
//! intercepted request, `FfiRouteCallback` implements one route. Adapters
//! that turn those tables into core traits live here to keep `lib.rs` focused
//! on the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use bridge_core::error::{RouteError, SchemeError};
use bridge_core::{
    Bridge, BridgeBuilder, BridgeError, ExecutionMode, HandlerError, HandlerResult, Request,
    ResponseInfo, RouteHandler, TransactionHandle, UrlSchemeType,
};

/// Opaque handle to a `BridgeBuilder`. Consumed by `bridge_builder_build`.
pub struct FfiBridgeBuilder {
    pub(crate) inner: BridgeBuilder,
}

/// Opaque handle to a built `Bridge`.
pub struct FfiBridge {
    pub(crate) inner: Bridge,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Scheme type as a C enum. `None` is only ever returned by
/// `bridge_classify` for URLs that match no registered scheme.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiSchemeType {
    None = 0,
    LocalRequest = 1,
    LocalResource = 2,
    EmbeddedResource = 3,
    ExternalRequest = 4,
}

impl FfiSchemeType {
    pub(crate) fn to_core(self) -> Option<UrlSchemeType> {
        match self {
            FfiSchemeType::None => None,
            FfiSchemeType::LocalRequest => Some(UrlSchemeType::LocalRequest),
            FfiSchemeType::LocalResource => Some(UrlSchemeType::LocalResource),
            FfiSchemeType::EmbeddedResource => Some(UrlSchemeType::EmbeddedResource),
            FfiSchemeType::ExternalRequest => Some(UrlSchemeType::ExternalRequest),
        }
    }
}

impl From<UrlSchemeType> for FfiSchemeType {
    fn from(t: UrlSchemeType) -> Self {
        match t {
            UrlSchemeType::LocalRequest => FfiSchemeType::LocalRequest,
            UrlSchemeType::LocalResource => FfiSchemeType::LocalResource,
            UrlSchemeType::EmbeddedResource => FfiSchemeType::EmbeddedResource,
            UrlSchemeType::ExternalRequest => FfiSchemeType::ExternalRequest,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiExecutionMode {
    Sync = 0,
    Async = 1,
}

impl From<FfiExecutionMode> for ExecutionMode {
    fn from(m: FfiExecutionMode) -> Self {
        match m {
            FfiExecutionMode::Sync => ExecutionMode::Sync,
            FfiExecutionMode::Async => ExecutionMode::Async,
        }
    }
}

impl From<ExecutionMode> for FfiExecutionMode {
    fn from(m: ExecutionMode) -> Self {
        match m {
            ExecutionMode::Sync => FfiExecutionMode::Sync,
            ExecutionMode::Async => FfiExecutionMode::Async,
        }
    }
}

/// Status codes returned by builder and reply functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NullArg = 1,
    InvalidUtf8 = 2,
    InvalidArgument = 3,
    Duplicate = 4,
    InvalidJson = 5,
    Runtime = 6,
    Panic = 7,
}

impl From<&BridgeError> for FfiErrorCode {
    fn from(err: &BridgeError) -> Self {
        match err {
            BridgeError::Scheme(SchemeError::Duplicate { .. })
            | BridgeError::Route(RouteError::Duplicate(_)) => FfiErrorCode::Duplicate,
            BridgeError::Scheme(SchemeError::EmptyName)
            | BridgeError::Route(RouteError::EmptyPath)
            | BridgeError::Config(_) => FfiErrorCode::InvalidArgument,
            BridgeError::Runtime(_) => FfiErrorCode::Runtime,
        }
    }
}

/// Whether `bridge_begin_intercept` took the request.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDecision {
    /// The bridge owns the transaction and will call exactly one terminal
    /// callback from a worker thread.
    ContinueAsync = 0,
    /// Not a local request; no callback will ever be invoked.
    PassThrough = 1,
    /// Bad arguments; no callback will ever be invoked. See `error_code`.
    Rejected = 2,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiInterceptResult {
    pub decision: FfiDecision,
    /// Branch the route runs on. Only meaningful for `ContinueAsync`.
    pub mode: FfiExecutionMode,
    pub error_code: FfiErrorCode,
}

impl FfiInterceptResult {
    pub(crate) fn rejected(error_code: FfiErrorCode) -> Self {
        Self {
            decision: FfiDecision::Rejected,
            mode: FfiExecutionMode::Sync,
            error_code,
        }
    }
}

// ---------------------------------------------------------------------------
// Borrowed views (caller-provided or valid only for one callback)
// ---------------------------------------------------------------------------

/// A key/value pair of borrowed C strings. Used for response headers and
/// request parameters.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// An intercepted engine request.
///
/// The C caller fills this on the stack; the bridge copies what it needs
/// before `bridge_begin_intercept` returns. `method` may be null (GET) and
/// `post_data` may be null when there is no body.
#[repr(C)]
pub struct FfiRequestDescriptor {
    pub identifier: u64,
    pub url: *const c_char,
    pub method: *const c_char,
    pub post_data: *const u8,
    pub post_data_len: usize,
}

/// Response metadata and body passed to the `complete` callback.
///
/// Every pointer is owned by the bridge and valid only until the callback
/// returns; copy anything that must outlive it.
#[repr(C)]
pub struct FfiResponseInfo {
    pub status: u16,
    pub status_text: *const c_char,
    pub mime_type: *const c_char,
    pub headers: *const FfiHeader,
    pub headers_len: u32,
    pub body: *const u8,
    pub body_len: u64,
}

/// A routed request passed to a C route callback. Valid only for the
/// duration of the callback. `post_data_json` is null without a body.
#[repr(C)]
pub struct FfiRouteRequest {
    pub id: *const c_char,
    pub path: *const c_char,
    pub parameters: *const FfiHeader,
    pub parameters_len: u32,
    pub post_data_json: *const c_char,
}

// ---------------------------------------------------------------------------
// Engine transaction
// ---------------------------------------------------------------------------

pub type FfiCompleteFn = extern "C" fn(user_data: *mut c_void, response: *const FfiResponseInfo);
pub type FfiCancelFn = extern "C" fn(user_data: *mut c_void);
pub type FfiIsAliveFn = extern "C" fn(user_data: *mut c_void) -> bool;

/// The engine's pending transaction as a callback table.
///
/// `complete` and `cancel` are required; `is_alive` is optional and, when
/// present, is asked before any result is written. Callbacks run on bridge
/// worker threads, so `user_data` must be safe to use from any thread.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FfiTransactionCallbacks {
    pub user_data: *mut c_void,
    pub complete: Option<FfiCompleteFn>,
    pub cancel: Option<FfiCancelFn>,
    pub is_alive: Option<FfiIsAliveFn>,
}

/// `FfiTransactionCallbacks` with the required entries present.
pub(crate) struct CTransaction {
    user_data: *mut c_void,
    complete: FfiCompleteFn,
    cancel: FfiCancelFn,
    is_alive: Option<FfiIsAliveFn>,
}

// SAFETY: the C caller promises `user_data` may be used from any thread
// (documented on `FfiTransactionCallbacks`).
unsafe impl Send for CTransaction {}

impl CTransaction {
    pub(crate) fn from_callbacks(callbacks: &FfiTransactionCallbacks) -> Option<Self> {
        Some(Self {
            user_data: callbacks.user_data,
            complete: callbacks.complete?,
            cancel: callbacks.cancel?,
            is_alive: callbacks.is_alive,
        })
    }
}

impl TransactionHandle for CTransaction {
    fn complete(self, response: ResponseInfo) {
        with_response_view(&response, |info| (self.complete)(self.user_data, info));
    }

    fn cancel(self) {
        (self.cancel)(self.user_data);
    }

    fn is_alive(&self) -> bool {
        self.is_alive.map_or(true, |alive| alive(self.user_data))
    }
}

/// Lend `response` to C as an `FfiResponseInfo` for the duration of `f`.
pub(crate) fn with_response_view<R>(
    response: &ResponseInfo,
    f: impl FnOnce(&FfiResponseInfo) -> R,
) -> R {
    let status_text = c_string(&response.status_text);
    let mime_type = c_string(&response.mime_type);
    let pairs: Vec<(CString, CString)> = response
        .headers
        .iter()
        .map(|(k, v)| (c_string(k), c_string(v)))
        .collect();
    let headers = header_views(&pairs);
    let body = response.stream.get_ref();
    let info = FfiResponseInfo {
        status: response.status,
        status_text: status_text.as_ptr(),
        mime_type: mime_type.as_ptr(),
        headers: slice_ptr(&headers),
        headers_len: headers.len() as u32,
        body: body.as_ptr(),
        body_len: body.len() as u64,
    };
    f(&info)
}

// ---------------------------------------------------------------------------
// C routes
// ---------------------------------------------------------------------------

/// A route implemented in C. The callback must store its result with
/// `bridge_reply_set_json` or `bridge_reply_set_error` before returning;
/// leaving the reply empty is treated as a handler failure.
pub type FfiRouteCallback =
    extern "C" fn(user_data: *mut c_void, request: *const FfiRouteRequest, reply: *mut FfiReply);

/// Out-parameter a C route writes its result into.
pub struct FfiReply {
    pub(crate) result: Option<HandlerResult>,
}

#[derive(Clone, Copy)]
pub(crate) struct CRoute {
    callback: FfiRouteCallback,
    user_data: *mut c_void,
}

// SAFETY: routes run concurrently on worker threads; the C caller promises
// the callback and `user_data` tolerate that (documented on
// `bridge_builder_add_route`).
unsafe impl Send for CRoute {}
unsafe impl Sync for CRoute {}

impl CRoute {
    pub(crate) fn new(callback: FfiRouteCallback, user_data: *mut c_void) -> Self {
        Self {
            callback,
            user_data,
        }
    }

    pub(crate) fn invoke(&self, request: &Request) -> HandlerResult {
        let id = c_string(&request.id);
        let path = c_string(&request.path);
        let pairs: Vec<(CString, CString)> = request
            .parameters
            .iter()
            .map(|(k, v)| (c_string(k), c_string(v)))
            .collect();
        let parameters = header_views(&pairs);
        let post = request.post_data_json.as_deref().map(c_string);
        let view = FfiRouteRequest {
            id: id.as_ptr(),
            path: path.as_ptr(),
            parameters: slice_ptr(&parameters),
            parameters_len: parameters.len() as u32,
            post_data_json: post.as_ref().map_or(std::ptr::null(), |p| p.as_ptr()),
        };
        let mut reply = FfiReply { result: None };
        (self.callback)(self.user_data, &view, &mut reply);
        reply
            .result
            .unwrap_or_else(|| Err(HandlerError::new("route callback left the reply empty")))
    }

    /// Async C routes are still blocking C calls; they run on the blocking
    /// pool so they never stall the async workers.
    pub(crate) fn into_handler(self, mode: ExecutionMode) -> RouteHandler {
        match mode {
            ExecutionMode::Sync => RouteHandler::sync(move |req| self.invoke(req)),
            ExecutionMode::Async => RouteHandler::from_async(move |req: Request| async move {
                match tokio::task::spawn_blocking(move || self.invoke(&req)).await {
                    Ok(result) => result,
                    Err(e) => Err(HandlerError::new(format!("route callback task failed: {e}"))),
                }
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Strings with interior NULs cannot cross as C strings; they become empty.
pub(crate) fn c_string(s: &str) -> CString {
    CString::new(s).unwrap_or_default()
}

fn header_views(pairs: &[(CString, CString)]) -> Vec<FfiHeader> {
    pairs
        .iter()
        .map(|(k, v)| FfiHeader {
            key: k.as_ptr(),
            value: v.as_ptr(),
        })
        .collect()
}

fn slice_ptr<T>(items: &[T]) -> *const T {
    if items.is_empty() {
        std::ptr::null()
    } else {
        items.as_ptr()
    }
}
