//! Executes a resolved route and produces a `Response`.
//!
//! # Design
//! This is the only place application code runs. Every entry point returns a
//! `Response`: handler errors and panics are caught here, logged with full
//! detail, and folded into a 400 with a generic message. Nothing raised by a
//! handler escapes into the transports.
//!
//! Async routes always run on the bridge's tokio runtime, including when
//! `execute` drives one from a plain thread, so timers and `spawn_blocking`
//! behave the same through either entry point.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};

use futures::FutureExt;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::error::DispatchError;
use crate::request::Request;
use crate::response::Response;
use crate::route::{AsyncHandler, RouteHandler, RouteProvider, SyncHandler};

/// Dispatches requests against a shared route table.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    routes: Arc<RouteProvider>,
    runtime: Handle,
}

impl RequestHandler {
    /// `runtime` is where async routes run.
    pub fn new(routes: Arc<RouteProvider>, runtime: Handle) -> Self {
        Self { routes, runtime }
    }

    pub fn routes(&self) -> &RouteProvider {
        &self.routes
    }

    /// Run the request on the calling thread.
    ///
    /// An async route is spawned on the runtime and waited for, so this
    /// blocks for as long as the handler takes. Must not be called from a
    /// task on a single-threaded runtime that is also `runtime`.
    pub fn execute(&self, request: &Request) -> Response {
        let outcome = match self.lookup(&request.path) {
            Ok(RouteHandler::Sync(f)) => run_sync(&f, request),
            Ok(RouteHandler::Async(f)) => self.block_on_route(f, request.clone()),
            Err(e) => Err(e),
        };
        self.finish(request, outcome)
    }

    /// Run the request without blocking the executor for async routes.
    ///
    /// Produces the same `Response` as `execute` for the same input.
    pub async fn execute_async(&self, request: Request) -> Response {
        let outcome = match self.lookup(&request.path) {
            Ok(RouteHandler::Sync(f)) => run_sync(&f, &request),
            Ok(RouteHandler::Async(f)) => run_async(&f, request.clone()).await,
            Err(e) => Err(e),
        };
        self.finish(&request, outcome)
    }

    fn block_on_route(&self, f: AsyncHandler, request: Request) -> Result<Value, DispatchError> {
        if Handle::try_current().is_err() {
            return self.runtime.block_on(run_async(&f, request));
        }
        // Handle::block_on panics inside a runtime context; hand off instead.
        let (tx, rx) = mpsc::channel();
        self.runtime.spawn(async move {
            let _ = tx.send(run_async(&f, request).await);
        });
        rx.recv().unwrap_or_else(|_| {
            Err(DispatchError::Panicked("route task dropped before replying".into()))
        })
    }

    fn lookup(&self, path: &str) -> Result<RouteHandler, DispatchError> {
        if path.is_empty() {
            return Err(DispatchError::EmptyPath);
        }
        self.routes
            .resolve(path)
            .map(|route| route.handler().clone())
            .ok_or_else(|| DispatchError::NoRoute(path.to_string()))
    }

    fn finish(&self, request: &Request, outcome: Result<Value, DispatchError>) -> Response {
        match &outcome {
            Ok(_) => tracing::debug!(request_id = %request.id, path = %request.path, "route completed"),
            Err(e @ (DispatchError::Handler(_) | DispatchError::Panicked(_))) => {
                tracing::error!(request_id = %request.id, path = %request.path, error = %e, "route failed")
            }
            Err(e) => tracing::warn!(request_id = %request.id, path = %request.path, error = %e, "request rejected"),
        }
        Response::from_outcome(&request.id, outcome)
    }
}

fn run_sync(f: &SyncHandler, request: &Request) -> Result<Value, DispatchError> {
    match catch_unwind(AssertUnwindSafe(|| f(request))) {
        Ok(result) => result.map_err(DispatchError::from),
        Err(payload) => Err(DispatchError::Panicked(panic_message(payload))),
    }
}

async fn run_async(f: &AsyncHandler, request: Request) -> Result<Value, DispatchError> {
    let fut = match catch_unwind(AssertUnwindSafe(|| f(request))) {
        Ok(fut) => fut,
        Err(payload) => return Err(DispatchError::Panicked(panic_message(payload))),
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result.map_err(DispatchError::from),
        Err(payload) => Err(DispatchError::Panicked(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::response::ReadyState;
    use crate::route::RouteOptions;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;
    use tokio::runtime::{Builder, Runtime};

    fn runtime() -> Handle {
        static RUNTIME: OnceLock<Runtime> = OnceLock::new();
        RUNTIME
            .get_or_init(|| {
                Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                    .unwrap()
            })
            .handle()
            .clone()
    }

    fn handler(hits: Arc<AtomicUsize>) -> RequestHandler {
        let mut routes = RouteProvider::new(RouteOptions::default());
        let h = hits.clone();
        routes
            .register_sync("/ping", move |_| {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"pong": true}))
            })
            .unwrap();
        routes
            .register_async("/echo", |req| async move {
                Ok(json!({"id": req.param("id"), "body": req.post_data}))
            })
            .unwrap();
        routes
            .register_sync("/fail", |_| Err(HandlerError::new("disk full")))
            .unwrap();
        routes
            .register_sync("/panic", |_| panic!("handler exploded"))
            .unwrap();
        routes
            .register_async("/panic-async", |_| async { panic!("async exploded") })
            .unwrap();
        routes
            .register_async("/timer", |_| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(json!([1, 2]))
            })
            .unwrap();
        routes
            .register_async("/blocking", |_| async {
                tokio::task::spawn_blocking(|| 6 * 7)
                    .await
                    .map(|n| json!(n))
                    .map_err(|e| HandlerError::new(e.to_string()))
            })
            .unwrap();
        RequestHandler::new(Arc::new(routes), runtime())
    }

    #[test]
    fn empty_path_is_bad_request_without_routing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let resp = handler(hits.clone()).execute(&Request::new("1", ""));
        assert_eq!(resp.status, 400);
        assert_eq!(resp.status_text, "Bad Request");
        assert_eq!(resp.ready_state, ReadyState::ResponseIsReady);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_route_is_not_found() {
        let resp = handler(Arc::default()).execute(&Request::new("1", "/missing"));
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn sync_route_success() {
        let hits = Arc::new(AtomicUsize::new(0));
        let resp = handler(hits.clone()).execute(&Request::new("7", "/ping"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.request_id, "7");
        assert_eq!(resp.data, json!({"pong": true}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_error_becomes_400() {
        let resp = handler(Arc::default()).execute(&Request::new("1", "/fail"));
        assert_eq!(resp.status, 400);
        assert_eq!(resp.data, json!("An error occured."));
    }

    #[test]
    fn handler_panic_becomes_400() {
        let h = handler(Arc::default());
        assert_eq!(h.execute(&Request::new("1", "/panic")).status, 400);
        assert_eq!(h.execute(&Request::new("1", "/panic-async")).status, 400);
    }

    #[tokio::test]
    async fn async_panic_becomes_400() {
        let resp = handler(Arc::default())
            .execute_async(Request::new("1", "/panic-async"))
            .await;
        assert_eq!(resp.status, 400);
        assert_eq!(resp.data, json!("An error occured."));
    }

    #[tokio::test]
    async fn sync_and_async_variants_agree() {
        let h = handler(Arc::default());
        for path in ["/ping", "/echo", "/fail", "/missing", ""] {
            let mut req = Request::new("3", path);
            req.parameters = vec![("id".into(), "42".into())];
            req.post_data = Some(json!({"x": 1}));
            let a = h.execute(&req);
            let b = h.execute_async(req).await;
            assert_eq!(
                serde_json::to_string(&a).unwrap(),
                serde_json::to_string(&b).unwrap(),
                "{path}"
            );
        }
    }

    #[test]
    fn tokio_backed_async_routes_agree_outside_a_runtime() {
        let h = handler(Arc::default());
        for (path, data) in [("/timer", json!([1, 2])), ("/blocking", json!(42))] {
            let a = h.execute(&Request::new("1", path));
            assert_eq!(a.status, 200, "{path}");
            assert_eq!(a.data, data, "{path}");
            let b = runtime().block_on(h.execute_async(Request::new("1", path)));
            assert_eq!(
                serde_json::to_string(&a).unwrap(),
                serde_json::to_string(&b).unwrap(),
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn execute_inside_another_runtime_still_reaches_tokio() {
        let resp = handler(Arc::default()).execute(&Request::new("2", "/timer"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.data, json!([1, 2]));
    }

    #[test]
    fn panic_message_extraction() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(5u8)), "unknown panic");
    }
}
