//! Error types for the bridge.
//!
//! # Design
//! Registration-time problems (`SchemeError`, `RouteError`, `ConfigError`)
//! surface to the application while the bridge is being built. Dispatch-time
//! problems never reach the engine as errors: `DispatchError` is the tagged
//! outcome of one request and is folded into a `Response` with an HTTP-style
//! status, and `MaterializeError` turns into a `cancel` on the transaction.

use thiserror::Error;

/// Errors raised while registering URL schemes.
#[derive(Debug, Error)]
pub enum SchemeError {
    #[error("scheme name must not be empty")]
    EmptyName,

    /// A scheme with the same (name, domain) identity is already registered.
    #[error("scheme {name}://{domain} is already registered")]
    Duplicate { name: String, domain: String },
}

/// Errors raised while registering routes.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route path must not be empty")]
    EmptyPath,

    #[error("route {0} is already registered")]
    Duplicate(String),
}

/// Errors raised while reading `BridgeConfig` from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors returned by `BridgeBuilder::build` and the builder setters.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Scheme(#[from] SchemeError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The owned worker runtime could not be started.
    #[error("failed to start worker runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Failure reported by application route code.
///
/// The message is logged by the request handler but never shown to script;
/// script only sees the generic error payload.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::new(format!("json: {e}"))
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::new(message)
    }
}

/// Tagged outcome of a failed dispatch, one variant per error kind.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request carried no path; no route was consulted.
    #[error("request path is empty")]
    EmptyPath,

    #[error("no route registered for {0}")]
    NoRoute(String),

    /// The route handler returned an error.
    #[error("route handler failed: {0}")]
    Handler(#[from] HandlerError),

    /// The route handler panicked.
    #[error("route handler panicked: {0}")]
    Panicked(String),
}

impl DispatchError {
    /// HTTP-style status code reported to script for this error.
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::NoRoute(_) => 404,
            DispatchError::EmptyPath | DispatchError::Handler(_) | DispatchError::Panicked(_) => 400,
        }
    }

    /// Message placed in `Response::data`. Handler detail is never leaked.
    pub fn public_message(&self) -> String {
        match self {
            DispatchError::EmptyPath => "Bad Request".to_string(),
            DispatchError::NoRoute(path) => format!("Route not found: {path}"),
            DispatchError::Handler(_) | DispatchError::Panicked(_) => "An error occured.".to_string(),
        }
    }
}

/// Reasons a response cannot be turned into a response body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaterializeError {
    /// Error responses are not streamed to the engine.
    #[error("response status {0} is not streamed")]
    Rejected(u16),

    #[error("serializer produced no payload")]
    EmptyPayload,
}
