//! Single-settlement completion handle.
//!
//! A [`Deferred`] is created together with its [`Pending`] future. The engine
//! keeps the handle next to the queued request and settles it once the
//! request has been acknowledged; the caller awaits the future.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::Error;

/// Producer side of a one-shot settlement.
#[derive(Debug)]
pub struct Deferred<V, E> {
    slot: Option<oneshot::Sender<Result<V, E>>>,
}

/// Consumer side of a [`Deferred`]. Resolves to the settled outcome.
///
/// If the handle is dropped without being settled, the future completes
/// with [`Error::Abandoned`] converted into the caller's error type.
#[derive(Debug)]
#[must_use = "the outcome of a queued request is only observable by awaiting it"]
pub struct Pending<V, E> {
    rx: oneshot::Receiver<Result<V, E>>,
}

impl<V, E> Deferred<V, E> {
    /// Create a handle and the future it settles.
    pub fn new() -> (Self, Pending<V, E>) {
        let (tx, rx) = oneshot::channel();
        (Self { slot: Some(tx) }, Pending { rx })
    }

    /// Resolve with `value`. Returns `false` if already settled.
    pub fn resolve(&mut self, value: V) -> bool {
        self.settle(Ok(value))
    }

    /// Reject with `error`. Returns `false` if already settled.
    pub fn reject(&mut self, error: E) -> bool {
        self.settle(Err(error))
    }

    /// Whether `resolve` or `reject` has already been called.
    pub fn is_settled(&self) -> bool {
        self.slot.is_none()
    }

    fn settle(&mut self, outcome: Result<V, E>) -> bool {
        match self.slot.take() {
            // A dropped receiver means nobody is waiting; the settlement
            // still counts.
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

impl<V, E> Future for Pending<V, E>
where
    E: From<Error>,
{
    type Output = Result<V, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|settled| settled.unwrap_or_else(|_| Err(E::from(Error::Abandoned))))
    }
}
