//! The engine's pending network transaction.
//!
//! # Design
//! The engine owns the real transaction; the bridge sees it through
//! `TransactionHandle`. Both terminal methods take `self`, so a handle can be
//! completed or cancelled once and never both. `PendingTransaction` wraps
//! the handle for the duration of one background task and cancels it on drop
//! if the task ended without a terminal call (for example by unwinding), so
//! the engine is never left waiting.

use crate::materialize::ResponseInfo;

/// Engine-side handle for one intercepted request.
pub trait TransactionHandle: Send + 'static {
    /// Deliver response metadata and body, then let the engine continue.
    fn complete(self, response: ResponseInfo);

    /// Abandon the transaction.
    fn cancel(self);

    /// False once the engine has disposed of the transaction.
    fn is_alive(&self) -> bool {
        true
    }
}

/// How a pending transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Completed,
    Cancelled,
    /// The engine disposed of the handle first; nothing was written.
    Discarded,
}

/// Exclusive owner of a transaction handle while its request is running.
pub struct PendingTransaction<T: TransactionHandle> {
    handle: Option<T>,
    request_id: u64,
}

impl<T: TransactionHandle> PendingTransaction<T> {
    pub fn new(handle: T, request_id: u64) -> Self {
        Self {
            handle: Some(handle),
            request_id,
        }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn complete(mut self, response: ResponseInfo) -> Terminal {
        match self.take_live() {
            Some(handle) => {
                tracing::debug!(request_id = self.request_id, status = response.status, "transaction completed");
                handle.complete(response);
                Terminal::Completed
            }
            None => Terminal::Discarded,
        }
    }

    pub fn cancel(mut self) -> Terminal {
        match self.take_live() {
            Some(handle) => {
                tracing::warn!(request_id = self.request_id, "transaction cancelled");
                handle.cancel();
                Terminal::Cancelled
            }
            None => Terminal::Discarded,
        }
    }

    fn take_live(&mut self) -> Option<T> {
        let handle = self.handle.take()?;
        if handle.is_alive() {
            Some(handle)
        } else {
            tracing::warn!(request_id = self.request_id, "transaction disposed by engine, result discarded");
            None
        }
    }
}

impl<T: TransactionHandle> Drop for PendingTransaction<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.is_alive() {
                tracing::warn!(request_id = self.request_id, "transaction dropped without reply, cancelling");
                handle.cancel();
            }
        }
    }
}
