//! Native request bridge for embedded browser engines.
//!
//! # Overview
//! Script running in the engine reaches native code two ways:
//! - **Virtual network**: requests to a registered local-request scheme
//!   (e.g. `http://command.com/...`) are intercepted, routed to a handler on
//!   a background worker and answered with a JSON body and status.
//! - **Direct call-in**: a bound object calls `BindingFacade::call` and gets
//!   the serialized response back synchronously.
//!
//! # Design
//! - Schemes and routes are registered on `BridgeBuilder` and frozen by
//!   `build`; dispatch only reads them.
//! - `RequestHandler` is the single boundary where application code runs;
//!   errors and panics become status codes there.
//! - The engine's pending transaction is a `TransactionHandle` whose terminal
//!   methods consume it, so each transaction is completed or cancelled once.
//! - Both transports serialize the same response envelope.

pub mod binding;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handler;
pub mod info;
pub mod interception;
pub mod materialize;
pub mod request;
pub mod response;
pub mod route;
pub mod scheduler;
pub mod scheme;
pub mod transaction;

pub use binding::{BindingFacade, DEFAULT_BINDING_NAME};
pub use bridge::{Bridge, BridgeBuilder};
pub use config::BridgeConfig;
pub use error::{
    BridgeError, ConfigError, DispatchError, HandlerError, MaterializeError, RouteError, SchemeError,
};
pub use handler::RequestHandler;
pub use interception::{InterceptDecision, InterceptionAdapter};
pub use materialize::{materialize, DataSerializer, JsonSerializer, ResponseInfo, JSON_MIME_TYPE};
pub use request::{Request, RequestDescriptor};
pub use response::{ReadyState, Response};
pub use route::{ExecutionMode, HandlerResult, Route, RouteHandler, RouteOptions, RouteProvider};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use scheme::{SchemeRegistry, UrlScheme, UrlSchemeType};
pub use transaction::{PendingTransaction, Terminal, TransactionHandle};
