//! Direct call-in transport for script-bound objects.
//!
//! # Design
//! Script calls a bound function and expects the serialized response as the
//! return value, so `call` is blocking. Sync routes run on the calling
//! thread. Async routes run on the scheduler while the caller waits on a
//! oneshot.
//!
//! Caller obligation: never call this from the engine's dispatch thread or
//! from inside the scheduler's async context. The wait would stall the
//! thread the result depends on (tokio panics on the latter).

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::handler::RequestHandler;
use crate::materialize::{serialize_response, DataSerializer};
use crate::request::{parameters_from_value, Request};
use crate::response::Response;
use crate::scheduler::Scheduler;

/// Object name script uses when none is configured.
pub const DEFAULT_BINDING_NAME: &str = "boundControllerAsync";

#[derive(Clone)]
pub struct BindingFacade {
    name: String,
    handler: RequestHandler,
    serializer: Arc<dyn DataSerializer>,
    scheduler: Arc<Scheduler>,
}

impl BindingFacade {
    pub fn new(
        name: impl Into<String>,
        handler: RequestHandler,
        serializer: Arc<dyn DataSerializer>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            name: name.into(),
            handler,
            serializer,
            scheduler,
        }
    }

    /// Name of the object exposed to script.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke `path` and return the serialized response envelope.
    ///
    /// Returns an empty string if the serializer yields nothing.
    pub fn call(&self, path: &str, parameters: Option<Value>, post_data: Option<Value>) -> String {
        let response = self.call_response(path, parameters, post_data);
        serialize_response(self.serializer.as_ref(), &response).unwrap_or_default()
    }

    /// Like `call`, without the final serialization.
    pub fn call_response(
        &self,
        path: &str,
        parameters: Option<Value>,
        post_data: Option<Value>,
    ) -> Response {
        let request = Request {
            id: Uuid::new_v4().to_string(),
            path: path.to_string(),
            parameters: parameters_from_value(parameters.as_ref()),
            post_data_json: post_data.as_ref().and_then(|v| self.serializer.serialize(v)),
            post_data,
            raw_post_data: None,
        };
        tracing::info!(request_id = %request.id, path = %request.path, binding = %self.name, "bound call");

        if !self.handler.routes().is_async(path) {
            return self.handler.execute(&request);
        }

        let request_id = request.id.clone();
        let handler = self.handler.clone();
        let (tx, rx) = oneshot::channel();
        self.scheduler.spawn(async move {
            let _ = tx.send(handler.execute_async(request).await);
        });
        match rx.blocking_recv() {
            Ok(response) => response,
            Err(_) => {
                let err = DispatchError::Panicked("bound call task dropped before replying".into());
                tracing::error!(request_id = %request_id, error = %err, "bound call failed");
                Response::error(&request_id, &err)
            }
        }
    }
}

impl std::fmt::Debug for BindingFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingFacade")
            .field("name", &self.name)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
