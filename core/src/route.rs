//! Path → handler routing table.
//!
//! # Design
//! Handlers are fixed-signature closures stored in a map keyed by the
//! normalized path. Each route declares its execution mode up front, so the
//! transports can pick the blocking pool or the async executor before the
//! handler runs. The table is built before the bridge starts and only read
//! afterwards.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{HandlerError, RouteError};
use crate::request::Request;

pub type HandlerResult = Result<Value, HandlerError>;

pub type SyncHandler = Arc<dyn Fn(&Request) -> HandlerResult + Send + Sync>;

pub type AsyncHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// How a route's handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    Sync,
    Async,
}

#[derive(Clone)]
pub enum RouteHandler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

impl RouteHandler {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        RouteHandler::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        RouteHandler::Async(Arc::new(move |req| f(req).boxed()))
    }

    pub fn mode(&self) -> ExecutionMode {
        match self {
            RouteHandler::Sync(_) => ExecutionMode::Sync,
            RouteHandler::Async(_) => ExecutionMode::Async,
        }
    }
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RouteHandler::{:?}", self.mode())
    }
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    path: String,
    handler: RouteHandler,
}

impl Route {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &RouteHandler {
        &self.handler
    }

    pub fn mode(&self) -> ExecutionMode {
        self.handler.mode()
    }

    pub fn is_async(&self) -> bool {
        self.mode() == ExecutionMode::Async
    }
}

/// Path normalization rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouteOptions {
    pub case_sensitive: bool,
    pub trim_trailing_slash: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            trim_trailing_slash: true,
        }
    }
}

impl RouteOptions {
    /// Normalize `path` into a lookup key. Returns `None` for empty paths.
    pub fn normalize(&self, path: &str) -> Option<String> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        let mut key = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        if self.trim_trailing_slash {
            while key.len() > 1 && key.ends_with('/') {
                key.pop();
            }
        }
        if !self.case_sensitive {
            key = key.to_lowercase();
        }
        Some(key)
    }
}

/// The routing table.
#[derive(Debug, Default)]
pub struct RouteProvider {
    options: RouteOptions,
    routes: HashMap<String, Route>,
}

impl RouteProvider {
    pub fn new(options: RouteOptions) -> Self {
        Self {
            options,
            routes: HashMap::new(),
        }
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    pub fn register(&mut self, path: &str, handler: RouteHandler) -> Result<(), RouteError> {
        let key = self.options.normalize(path).ok_or(RouteError::EmptyPath)?;
        if self.routes.contains_key(&key) {
            return Err(RouteError::Duplicate(key));
        }
        tracing::debug!(path = %key, mode = ?handler.mode(), "route registered");
        self.routes.insert(key.clone(), Route { path: key, handler });
        Ok(())
    }

    pub fn register_sync<F>(&mut self, path: &str, f: F) -> Result<(), RouteError>
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(path, RouteHandler::sync(f))
    }

    pub fn register_async<F, Fut>(&mut self, path: &str, f: F) -> Result<(), RouteError>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(path, RouteHandler::from_async(f))
    }

    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let key = self.options.normalize(path)?;
        self.routes.get(&key)
    }

    /// False when no route matches; check `resolve` first to tell the cases apart.
    pub fn is_async(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(Route::is_async)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
