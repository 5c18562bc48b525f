//! The queue handle and the state it shares with its drive task.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use opentelemetry::KeyValue;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cycle;
use crate::deferred::{Deferred, Pending};
use crate::error::{BoxError, Error, Result};
use crate::middleware::{Middleware, Stage};
use crate::model::{Method, Request, Response};
use crate::telemetry::metrics;
use crate::transport::Transport;

/// Whether a drive task is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// No drive task. The queue is empty.
    Idle,
    /// A drive task is processing the head of the queue.
    Busy,
}

type Listener = Arc<dyn Fn(&Error) + Send + Sync>;

/// A queued request together with the handle that settles its caller.
pub(crate) struct Entry<T, E> {
    id: Uuid,
    request: Request,
    attempts: u32,
    deferred: Deferred<Option<T>, E>,
}

/// Snapshot of the head taken at the start of a cycle.
pub(crate) struct Head {
    pub(crate) id: Uuid,
    pub(crate) request: Request,
    pub(crate) attempt: u32,
}

/// Result of acknowledging the head.
pub(crate) struct Settled {
    pub(crate) outcome: &'static str,
    pub(crate) attempts: u32,
    /// The queue emptied and the state went back to Idle.
    pub(crate) drained: bool,
}

struct Lane<T, E> {
    entries: VecDeque<Entry<T, E>>,
    state: State,
}

pub(crate) struct Inner<T, E> {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) middleware: Middleware<T, E>,
    lane: Mutex<Lane<T, E>>,
    listeners: Mutex<Vec<Listener>>,
    runtime: Handle,
}

/// A single-concurrency request queue.
///
/// Requests are processed one at a time in push order. Each runs through the
/// request, response or error, and post-action middleware; a post-action
/// failure keeps the request at the head and retries it.
///
/// Cloning a `Queue` yields another handle to the same queue.
pub struct Queue<T = Response, E = Error> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Queue<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Queue {
    /// Create a queue with the default middleware, on the current tokio runtime.
    pub fn new(transport: impl Transport) -> Result<Self> {
        Self::with_middleware(transport, Middleware::default())
    }
}

impl<T, E> Queue<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a queue with custom middleware, on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when called outside a tokio runtime.
    pub fn with_middleware(transport: impl Transport, middleware: Middleware<T, E>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        Ok(Self::with_runtime(runtime, transport, middleware))
    }

    /// Create a queue whose drive tasks run on `runtime`.
    pub fn with_runtime(
        runtime: Handle,
        transport: impl Transport,
        middleware: Middleware<T, E>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                middleware,
                lane: Mutex::new(Lane {
                    entries: VecDeque::new(),
                    state: State::Idle,
                }),
                listeners: Mutex::new(Vec::new()),
                runtime,
            }),
        }
    }

    /// Queue a request. Starts a drive task if the queue was idle.
    ///
    /// A missing `method` becomes `GET`. Every failure is reported through
    /// the returned future; it resolves to `None` when the exchange was
    /// skipped or the response middleware failed.
    pub fn push(&self, mut request: Request) -> Pending<Option<T>, E> {
        request.apply_defaults();
        let (deferred, pending) = Deferred::new();
        let id = Uuid::new_v4();
        let method = request.effective_method();

        metrics::requests_pushed().add(1, &[KeyValue::new(metrics::HTTP_METHOD, method.to_string())]);
        debug!(
            %id,
            %method,
            url = request.url.as_deref().unwrap_or(""),
            "request queued"
        );

        let start = {
            let mut lane = self.inner.lock_lane();
            lane.entries.push_back(Entry {
                id,
                request,
                attempts: 0,
                deferred,
            });
            match lane.state {
                State::Idle => {
                    lane.state = State::Busy;
                    true
                }
                State::Busy => false,
            }
        };

        if start {
            let driver = cycle::Driver::new(Arc::clone(&self.inner));
            self.inner.runtime.spawn(driver.run());
        }
        pending
    }

    pub fn get(&self, request: Request) -> Pending<Option<T>, E> {
        self.push(request.method(Method::Get))
    }

    pub fn head(&self, request: Request) -> Pending<Option<T>, E> {
        self.push(request.method(Method::Head))
    }

    pub fn post(&self, request: Request) -> Pending<Option<T>, E> {
        self.push(request.method(Method::Post))
    }

    pub fn put(&self, request: Request) -> Pending<Option<T>, E> {
        self.push(request.method(Method::Put))
    }

    pub fn patch(&self, request: Request) -> Pending<Option<T>, E> {
        self.push(request.method(Method::Patch))
    }

    pub fn delete(&self, request: Request) -> Pending<Option<T>, E> {
        self.push(request.method(Method::Delete))
    }

    /// Register a listener for request, response and error middleware
    /// failures. Listeners never influence how a request settles.
    pub fn on_unhandled_error<F>(&self, listener: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    pub fn state(&self) -> State {
        self.inner.lock_lane().state
    }

    /// Number of requests not yet settled, including the one in flight.
    pub fn len(&self) -> usize {
        self.inner.lock_lane().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, E> Inner<T, E> {
    fn lock_lane(&self) -> MutexGuard<'_, Lane<T, E>> {
        self.lane.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy out the head for a new cycle, or go Idle if there is none.
    pub(crate) fn next_head(&self) -> Option<Head> {
        let mut lane = self.lock_lane();
        let Some(entry) = lane.entries.front_mut() else {
            lane.state = State::Idle;
            return None;
        };
        entry.attempts += 1;
        let head = Head {
            id: entry.id,
            request: entry.request.clone(),
            attempt: entry.attempts,
        };
        lane.state = State::Busy;
        Some(head)
    }

    /// Remove the head and settle its caller.
    ///
    /// Popping, settling and the switch to Idle happen under one lock, so
    /// a concurrent push either lands behind this entry in the same busy
    /// period or starts a fresh drive task after it.
    pub(crate) fn acknowledge(&self, id: Uuid, outcome: std::result::Result<Option<T>, E>) -> Option<Settled> {
        let mut lane = self.lock_lane();
        if lane.entries.front().map(|entry| entry.id) != Some(id) {
            warn!(%id, "acknowledged request is no longer at the head");
            return None;
        }
        let mut entry = lane.entries.pop_front()?;

        let outcome = match outcome {
            Ok(value) => {
                entry.deferred.resolve(value);
                "resolved"
            }
            Err(error) => {
                entry.deferred.reject(error);
                "rejected"
            }
        };

        let drained = lane.entries.is_empty();
        if drained {
            lane.state = State::Idle;
        }
        drop(lane);

        info!(id = %entry.id, outcome, attempts = entry.attempts, "request settled");
        Some(Settled {
            outcome,
            attempts: entry.attempts,
            drained,
        })
    }

    /// Deliver a middleware failure to every listener.
    pub(crate) fn notify_unhandled(&self, stage: Stage, source: BoxError) {
        let error = Error::middleware(stage, source);
        warn!(%stage, %error, "unhandled middleware error");
        metrics::unhandled_errors().add(1, &[KeyValue::new("stage", stage.as_str())]);

        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| listener(&error)));
            if delivered.is_err() {
                warn!(%stage, "unhandled-error listener panicked");
            }
        }
    }

    /// Drop every queued entry and go back to Idle.
    ///
    /// Callers of the dropped entries see [`Error::Abandoned`].
    pub(crate) fn abandon(&self) {
        let entries = {
            let mut lane = self.lock_lane();
            lane.state = State::Idle;
            std::mem::take(&mut lane.entries)
        };
        if !entries.is_empty() {
            warn!(count = entries.len(), "drive task stopped early, queued requests abandoned");
        }
    }
}
