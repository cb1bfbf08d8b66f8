//! Capability trait and cooperative cancellation signal.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::domain::TaskArgs;

/// An invocable unit of work bound to a function name.
///
/// Failures are reported as `eyre` errors; the worker records their message on
/// the task. Long-running capabilities should watch `cancel` and return early
/// once it fires, since cancellation and timeouts are otherwise best-effort.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn call(&self, args: TaskArgs, cancel: CancelSignal) -> eyre::Result<Value>;
}

/// Adapter turning an async closure into a [`Capability`]
pub struct FnCapability<F> {
    f: F,
}

impl<F> FnCapability<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Capability for FnCapability<F>
where
    F: Fn(TaskArgs, CancelSignal) -> Fut + Send + Sync,
    Fut: Future<Output = eyre::Result<Value>> + Send,
{
    async fn call(&self, args: TaskArgs, cancel: CancelSignal) -> eyre::Result<Value> {
        (self.f)(args, cancel).await
    }
}

/// Receiving side of a cancellation request, handed to capabilities.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever if it never is.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender gone without cancelling
            std::future::pending::<()>().await;
        }
    }
}

/// Sending side of a cancellation request, held by the scheduler.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal { rx: self.tx.subscribe() }
    }
}

/// Create a linked handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, _rx) = watch::channel(false);
    let handle = CancelHandle { tx };
    let signal = handle.signal();
    (handle, signal)
}
