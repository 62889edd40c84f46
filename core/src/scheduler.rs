//! Background worker pool for dispatched requests.
//!
//! # Design
//! A thin layer over a tokio multi-thread runtime. The bridge either owns
//! the runtime (built from `SchedulerConfig`) or borrows a `Handle` from an
//! application that already runs tokio. Sync routes go to the blocking pool,
//! async routes are spawned as tasks. No ordering between requests.
//!
//! An owned runtime is shut down in the background when the scheduler is
//! dropped from async code (a host's own runtime or one of ours); elsewhere
//! the drop waits for running blocking work. Either way unfinished tasks are
//! dropped, which cancels their pending transactions.

use std::future::Future;

use serde::Deserialize;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker thread count; tokio's default (one per core) when unset.
    pub worker_threads: Option<usize>,
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "bridge-worker".to_string(),
        }
    }
}

enum Inner {
    Owned(Runtime),
    Shared(Handle),
}

pub struct Scheduler {
    inner: Inner,
}

impl Scheduler {
    /// Start a dedicated runtime.
    pub fn owned(config: &SchedulerConfig) -> std::io::Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(config.thread_name.clone()).enable_all();
        if let Some(n) = config.worker_threads {
            builder.worker_threads(n.max(1));
        }
        let runtime = builder.build()?;
        tracing::info!(thread_name = %config.thread_name, workers = ?config.worker_threads, "bridge scheduler started");
        Ok(Self {
            inner: Inner::Owned(runtime),
        })
    }

    /// Run on an existing runtime.
    pub fn shared(handle: Handle) -> Self {
        Self {
            inner: Inner::Shared(handle),
        }
    }

    pub fn handle(&self) -> &Handle {
        match &self.inner {
            Inner::Owned(rt) => rt.handle(),
            Inner::Shared(h) => h,
        }
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle().spawn(future)
    }

    pub fn spawn_blocking<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle().spawn_blocking(f)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if Handle::try_current().is_err() {
            return;
        }
        let Inner::Owned(rt) = &self.inner else {
            return;
        };
        let detached = Inner::Shared(rt.handle().clone());
        if let Inner::Owned(rt) = std::mem::replace(&mut self.inner, detached) {
            tracing::debug!("scheduler dropped inside a runtime, shutting down in the background");
            rt.shutdown_background();
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner {
            Inner::Owned(_) => "owned",
            Inner::Shared(_) => "shared",
        };
        f.debug_struct("Scheduler").field("runtime", &kind).finish()
    }
}
