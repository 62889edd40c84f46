//! Virtual-network transport: the engine-facing request lifecycle.
//!
//! # Design
//! `begin_intercept` runs on the engine's dispatch thread and returns at
//! once. It classifies the URL, and for a local request it picks the
//! execution branch from the route table, takes ownership of the transaction
//! and schedules the rest:
//!
//! ```text
//! Received -> Classified -> PassThrough                       (not local)
//!                        -> Dispatched -> Executing -> Continued (200)
//!                                                   -> Cancelled (>= 400, no payload)
//! ```
//!
//! The background task is the transaction's only owner. It ends in exactly
//! one `complete` or `cancel`; `PendingTransaction` cancels on drop if the
//! task is torn down before it replies.

use std::sync::Arc;

use url::Url;

use crate::handler::RequestHandler;
use crate::materialize::{materialize, DataSerializer};
use crate::request::{url_path, Request, RequestDescriptor};
use crate::response::Response;
use crate::route::ExecutionMode;
use crate::scheduler::Scheduler;
use crate::scheme::{SchemeRegistry, UrlSchemeType};
use crate::transaction::{PendingTransaction, Terminal, TransactionHandle};

/// What `begin_intercept` tells the engine.
#[derive(Debug)]
pub enum InterceptDecision<T> {
    /// The bridge owns the transaction and will reply from a background
    /// task. Carries the execution branch that was chosen.
    ContinueAsync(ExecutionMode),
    /// Not a local request; the untouched transaction goes back to the engine.
    PassThrough(T),
}

impl<T> InterceptDecision<T> {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, InterceptDecision::PassThrough(_))
    }

    pub fn mode(&self) -> Option<ExecutionMode> {
        match self {
            InterceptDecision::ContinueAsync(mode) => Some(*mode),
            InterceptDecision::PassThrough(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct InterceptionAdapter {
    schemes: Arc<SchemeRegistry>,
    handler: RequestHandler,
    serializer: Arc<dyn DataSerializer>,
    scheduler: Arc<Scheduler>,
}

impl InterceptionAdapter {
    pub fn new(
        schemes: Arc<SchemeRegistry>,
        handler: RequestHandler,
        serializer: Arc<dyn DataSerializer>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            schemes,
            handler,
            serializer,
            scheduler,
        }
    }

    /// Accept an engine request. Never blocks on handler work.
    pub fn begin_intercept<T: TransactionHandle>(
        &self,
        request: RequestDescriptor,
        transaction: T,
    ) -> InterceptDecision<T> {
        let Some(path) = self.local_path(&request.url) else {
            tracing::debug!(request_id = request.identifier, url = %request.url, "not a local request, passing through");
            return InterceptDecision::PassThrough(transaction);
        };

        let mode = if self.handler.routes().is_async(&path) {
            ExecutionMode::Async
        } else {
            ExecutionMode::Sync
        };
        tracing::info!(request_id = request.identifier, method = %request.method, path = %path, ?mode, "dispatching request");

        let pending = PendingTransaction::new(transaction, request.identifier);
        let handler = self.handler.clone();
        let serializer = Arc::clone(&self.serializer);
        match mode {
            ExecutionMode::Sync => {
                self.scheduler.spawn_blocking(move || {
                    let req = Request::from_descriptor(&request, path, serializer.as_ref());
                    let response = handler.execute(&req);
                    deliver(pending, &response, serializer.as_ref())
                });
            }
            ExecutionMode::Async => {
                self.scheduler.spawn(async move {
                    let req = Request::from_descriptor(&request, path, serializer.as_ref());
                    let response = handler.execute_async(req).await;
                    deliver(pending, &response, serializer.as_ref())
                });
            }
        }
        InterceptDecision::ContinueAsync(mode)
    }

    /// Path of `url` when it belongs to a local-request scheme.
    fn local_path(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let scheme = self.schemes.classify_url(&parsed)?;
        if scheme.scheme_type() != UrlSchemeType::LocalRequest {
            return None;
        }
        Some(url_path(&parsed))
    }
}

/// Terminal step of a dispatched request.
fn deliver<T: TransactionHandle>(
    pending: PendingTransaction<T>,
    response: &Response,
    serializer: &dyn DataSerializer,
) -> Terminal {
    match materialize(serializer, response) {
        Ok(info) => pending.complete(info),
        Err(e) => {
            tracing::warn!(request_id = pending.request_id(), status = response.status, error = %e, "no response body");
            pending.cancel()
        }
    }
}

impl std::fmt::Debug for InterceptionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionAdapter")
            .field("schemes", &self.schemes)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
