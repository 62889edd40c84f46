//! In-process stand-in for a browser engine.
//!
//! # Overview
//! `MockEngine` plays the engine side of both transports: it "loads" URLs by
//! offering them to the bridge's interception adapter with a recording
//! transaction, and it makes direct call-ins the way a bound script object
//! would. `demo_bridge` builds a small application (ping, echo, a movie list
//! and a deliberately slow failing route) used by the demo binary and the
//! integration tests.
//!
//! # Design
//! - `RecordingTransaction` forwards its single terminal call over an mpsc
//!   channel and counts terminal calls engine-wide, so tests can assert
//!   exactly-once delivery.
//! - `InFlight` is the engine's view of a pending load. It can be disposed
//!   before the bridge answers, which is how engine-side navigation away is
//!   simulated.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, RwLock};
use std::time::Duration;

use bridge_core::{
    Bridge, BridgeBuilder, BridgeConfig, BridgeError, ExecutionMode, HandlerError, InterceptDecision,
    Request, RequestDescriptor, ResponseInfo, TransactionHandle, UrlSchemeType,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} is not a local request")]
    PassedThrough(String),

    #[error("request {0} got no reply within the timeout")]
    TimedOut(u64),
}

// ---------------------------------------------------------------------------
// Transaction side
// ---------------------------------------------------------------------------

/// What the engine received for a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedResponse {
    pub status: u16,
    pub status_text: String,
    pub mime_type: String,
    pub headers: Vec<(String, String)>,
    pub length: u64,
    pub body: String,
}

impl CompletedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

impl From<ResponseInfo> for CompletedResponse {
    fn from(info: ResponseInfo) -> Self {
        Self {
            status: info.status,
            status_text: info.status_text,
            mime_type: info.mime_type,
            headers: info.headers,
            length: info.length,
            body: String::from_utf8_lossy(&info.stream.into_inner()).into_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(CompletedResponse),
    Cancelled,
}

impl Outcome {
    pub fn completed(self) -> Option<CompletedResponse> {
        match self {
            Outcome::Completed(response) => Some(response),
            Outcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }
}

pub struct RecordingTransaction {
    tx: mpsc::Sender<Outcome>,
    alive: Arc<AtomicBool>,
    terminals: Arc<AtomicUsize>,
}

impl TransactionHandle for RecordingTransaction {
    fn complete(self, response: ResponseInfo) {
        self.terminals.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(Outcome::Completed(response.into()));
    }

    fn cancel(self) {
        self.terminals.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(Outcome::Cancelled);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// A load the bridge accepted and has not answered yet.
pub struct InFlight {
    request_id: u64,
    mode: ExecutionMode,
    alive: Arc<AtomicBool>,
    rx: mpsc::Receiver<Outcome>,
}

impl InFlight {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Drop the transaction on the engine side, as a navigation away would.
    pub fn dispose(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn wait(&self, timeout: Duration) -> Result<Outcome, EngineError> {
        self.rx
            .recv_timeout(timeout)
            .map_err(|_| EngineError::TimedOut(self.request_id))
    }

    /// True if nothing arrives for `period`.
    pub fn stays_silent(&self, period: Duration) -> bool {
        self.rx.recv_timeout(period).is_err()
    }
}

/// A finished load.
#[derive(Debug)]
pub struct Load {
    pub request_id: u64,
    pub mode: ExecutionMode,
    pub outcome: Outcome,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct MockEngine {
    bridge: Bridge,
    next_id: AtomicU64,
    terminals: Arc<AtomicUsize>,
    timeout: Duration,
}

impl MockEngine {
    pub fn new(bridge: Bridge) -> Self {
        Self {
            bridge,
            next_id: AtomicU64::new(1),
            terminals: Arc::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Terminal calls received across every load so far.
    pub fn terminal_calls(&self) -> usize {
        self.terminals.load(Ordering::SeqCst)
    }

    /// Offer a request to the bridge without waiting for the reply.
    pub fn begin(&self, url: &str, post_data: Option<&[u8]>) -> Result<InFlight, EngineError> {
        let request_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let descriptor = match post_data {
            Some(body) => RequestDescriptor::post(request_id, url, body),
            None => RequestDescriptor::get(request_id, url),
        };
        let (tx, rx) = mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let transaction = RecordingTransaction {
            tx,
            alive: alive.clone(),
            terminals: self.terminals.clone(),
        };
        match self.bridge.begin_intercept(descriptor, transaction) {
            InterceptDecision::ContinueAsync(mode) => {
                tracing::debug!(request_id, url, ?mode, "load accepted");
                Ok(InFlight {
                    request_id,
                    mode,
                    alive,
                    rx,
                })
            }
            InterceptDecision::PassThrough(_) => Err(EngineError::PassedThrough(url.to_string())),
        }
    }

    pub fn get(&self, url: &str) -> Result<Load, EngineError> {
        self.load(url, None)
    }

    pub fn post(&self, url: &str, body: &str) -> Result<Load, EngineError> {
        self.load(url, Some(body.as_bytes()))
    }

    fn load(&self, url: &str, post_data: Option<&[u8]>) -> Result<Load, EngineError> {
        let in_flight = self.begin(url, post_data)?;
        let outcome = in_flight.wait(self.timeout)?;
        Ok(Load {
            request_id: in_flight.request_id,
            mode: in_flight.mode,
            outcome,
        })
    }

    /// Call-in through the bound object, parsed the way script would.
    pub fn call(
        &self,
        path: &str,
        parameters: Option<Value>,
        post_data: Option<Value>,
    ) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.bridge.call(path, parameters, post_data))
    }
}

// ---------------------------------------------------------------------------
// Demo application
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub year: u16,
}

#[derive(Deserialize)]
pub struct NewMovie {
    pub title: String,
    pub year: u16,
}

pub type MovieStore = Arc<RwLock<Vec<Movie>>>;

pub fn seed_movies() -> MovieStore {
    let movies = [("Metropolis", 1927), ("Alien", 1979), ("Arrival", 2016)]
        .into_iter()
        .map(|(title, year)| Movie {
            id: Uuid::new_v4(),
            title: title.to_string(),
            year,
        })
        .collect();
    Arc::new(RwLock::new(movies))
}

/// Build the demo bridge with `http://command.com` as its local-request
/// scheme.
pub fn demo_bridge(config: BridgeConfig) -> Result<Bridge, BridgeError> {
    demo_builder(BridgeBuilder::new(config), seed_movies())?.build()
}

pub fn demo_builder(builder: BridgeBuilder, store: MovieStore) -> Result<BridgeBuilder, BridgeError> {
    let list_store = store.clone();
    builder
        .scheme("http", "command.com", UrlSchemeType::LocalRequest)?
        .scheme("local", "", UrlSchemeType::LocalResource)?
        .scheme("https", "", UrlSchemeType::ExternalRequest)?
        .route_sync("/ping", |_| Ok(json!({"pong": true})))?
        .route_sync("/echo", echo)?
        .route_async("/movies", move |req| list_movies(list_store.clone(), req))?
        .route_sync("/movies/add", move |req| add_movie(&store, req))?
        .route_async("/slow", |_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<Value, _>(HandlerError::new("slow route gave up"))
        })
}

fn echo(req: &Request) -> Result<Value, HandlerError> {
    let parameters: BTreeMap<&str, &str> = req
        .parameters
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    Ok(json!({
        "parameters": parameters,
        "postData": req.post_data,
    }))
}

async fn list_movies(store: MovieStore, req: Request) -> Result<Value, HandlerError> {
    let limit = match req.param("limit") {
        Some(v) => v
            .parse::<usize>()
            .map_err(|e| HandlerError::new(format!("bad limit {v:?}: {e}")))?,
        None => usize::MAX,
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    let movies = store
        .read()
        .map_err(|_| HandlerError::new("movie store poisoned"))?;
    let page: Vec<&Movie> = movies.iter().take(limit).collect();
    Ok(serde_json::to_value(page)?)
}

fn add_movie(store: &MovieStore, req: &Request) -> Result<Value, HandlerError> {
    let input: NewMovie = req.post_as()?;
    if input.title.trim().is_empty() {
        return Err(HandlerError::new("movie title is empty"));
    }
    let movie = Movie {
        id: Uuid::new_v4(),
        title: input.title,
        year: input.year,
    };
    store
        .write()
        .map_err(|_| HandlerError::new("movie store poisoned"))?
        .push(movie.clone());
    Ok(serde_json::to_value(movie)?)
}
