//! Wiring the components into a running bridge.
//!
//! # Design
//! `BridgeBuilder` is the only mutable phase: schemes and routes are
//! registered here. `build` freezes both tables behind `Arc`s, starts (or
//! attaches to) the scheduler and hands out the two transports. After that
//! nothing in the bridge is mutated, so dispatch needs no locks.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::binding::BindingFacade;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::handler::RequestHandler;
use crate::info::register_info_route;
use crate::interception::{InterceptDecision, InterceptionAdapter};
use crate::materialize::{DataSerializer, JsonSerializer};
use crate::request::{Request, RequestDescriptor};
use crate::route::{HandlerResult, RouteHandler, RouteProvider};
use crate::scheduler::Scheduler;
use crate::scheme::{SchemeRegistry, UrlScheme, UrlSchemeType};
use crate::transaction::TransactionHandle;

pub struct BridgeBuilder {
    config: BridgeConfig,
    schemes: SchemeRegistry,
    routes: RouteProvider,
    serializer: Arc<dyn DataSerializer>,
    runtime: Option<Handle>,
}

impl BridgeBuilder {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            routes: RouteProvider::new(config.routes.clone()),
            config,
            schemes: SchemeRegistry::new(),
            serializer: Arc::new(JsonSerializer),
            runtime: None,
        }
    }

    pub fn add_scheme(
        &mut self,
        name: &str,
        domain: &str,
        scheme_type: UrlSchemeType,
    ) -> Result<(), BridgeError> {
        self.schemes
            .register(UrlScheme::new(name, domain, scheme_type))?;
        Ok(())
    }

    pub fn add_route(&mut self, path: &str, handler: RouteHandler) -> Result<(), BridgeError> {
        self.routes.register(path, handler)?;
        Ok(())
    }

    pub fn scheme(
        mut self,
        name: &str,
        domain: &str,
        scheme_type: UrlSchemeType,
    ) -> Result<Self, BridgeError> {
        self.add_scheme(name, domain, scheme_type)?;
        Ok(self)
    }

    pub fn route(mut self, path: &str, handler: RouteHandler) -> Result<Self, BridgeError> {
        self.add_route(path, handler)?;
        Ok(self)
    }

    pub fn route_sync<F>(self, path: &str, f: F) -> Result<Self, BridgeError>
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(path, RouteHandler::sync(f))
    }

    pub fn route_async<F, Fut>(self, path: &str, f: F) -> Result<Self, BridgeError>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(path, RouteHandler::from_async(f))
    }

    /// Replace the default JSON serializer.
    pub fn serializer(mut self, serializer: Arc<dyn DataSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Run on an existing tokio runtime instead of starting one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(mut self) -> Result<Bridge, BridgeError> {
        if self.config.info_route {
            register_info_route(&mut self.routes)?;
        }
        let scheduler = match self.runtime {
            Some(handle) => Scheduler::shared(handle),
            None => Scheduler::owned(&self.config.scheduler)?,
        };
        let scheduler = Arc::new(scheduler);
        let schemes = Arc::new(self.schemes);
        let handler = RequestHandler::new(Arc::new(self.routes), scheduler.handle().clone());
        tracing::info!(
            schemes = schemes.len(),
            routes = handler.routes().len(),
            binding = %self.config.binding_name,
            "bridge built"
        );

        let interceptor = InterceptionAdapter::new(
            Arc::clone(&schemes),
            handler.clone(),
            Arc::clone(&self.serializer),
            Arc::clone(&scheduler),
        );
        let binding = BindingFacade::new(
            self.config.binding_name,
            handler,
            self.serializer,
            scheduler,
        );
        Ok(Bridge {
            schemes,
            interceptor,
            binding,
        })
    }
}

impl std::fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("config", &self.config)
            .field("schemes", &self.schemes)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

/// A built bridge: both transports over one route table.
#[derive(Debug, Clone)]
pub struct Bridge {
    schemes: Arc<SchemeRegistry>,
    interceptor: InterceptionAdapter,
    binding: BindingFacade,
}

impl Bridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    pub fn schemes(&self) -> &SchemeRegistry {
        &self.schemes
    }

    pub fn interceptor(&self) -> &InterceptionAdapter {
        &self.interceptor
    }

    pub fn binding(&self) -> &BindingFacade {
        &self.binding
    }

    /// Shorthand for `interceptor().begin_intercept`.
    pub fn begin_intercept<T: TransactionHandle>(
        &self,
        request: RequestDescriptor,
        transaction: T,
    ) -> InterceptDecision<T> {
        self.interceptor.begin_intercept(request, transaction)
    }

    /// Shorthand for `binding().call`.
    pub fn call(
        &self,
        path: &str,
        parameters: Option<serde_json::Value>,
        post_data: Option<serde_json::Value>,
    ) -> String {
        self.binding.call(path, parameters, post_data)
    }
}
