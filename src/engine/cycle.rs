//! The drive loop.
//!
//! One drive task runs per busy period. Each iteration is a cycle: clone the
//! head, run it through the middleware and the transport, then let the
//! post-action decide between acknowledging (settle and remove the head) and
//! nacking (keep the head and run it again).
//!
//! A panicking stage is caught and handled like that stage returning an
//! error, so one bad request never stops the queue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt as _;
use opentelemetry::KeyValue;
use tracing::{Instrument, debug, warn};

use super::queue::Inner;
use crate::error::{BoxError, Error};
use crate::middleware::Stage;
use crate::model::{Request, Response};
use crate::telemetry::{metrics, request as spans};
use crate::transport;

/// What the post-action decided for a cycle.
enum Verdict<T, E> {
    Ack(Result<Option<T>, E>),
    Nack,
}

/// Owns the drive task for one busy period.
///
/// If the task is dropped before the queue drains (runtime shutdown, or a
/// panic outside the stages), every queued entry is abandoned and the queue
/// goes back to Idle so the next push starts a fresh task.
pub(crate) struct Driver<T, E> {
    inner: Arc<Inner<T, E>>,
    finished: bool,
}

impl<T, E> Driver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn new(inner: Arc<Inner<T, E>>) -> Self {
        Self {
            inner,
            finished: false,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("drive task started");
        let inner = Arc::clone(&self.inner);

        while let Some(head) = inner.next_head() {
            let span = spans::start_cycle_span(&head.id, &head.request, head.attempt);
            let verdict = run_cycle(&inner, head.request).instrument(span.clone()).await;

            match verdict {
                Verdict::Ack(outcome) => {
                    metrics::cycles().add(1, &[KeyValue::new("outcome", "ack")]);
                    let Some(settled) = inner.acknowledge(head.id, outcome) else {
                        continue;
                    };
                    spans::record_outcome(&span, settled.outcome);
                    if settled.attempts > 1 {
                        debug!(id = %head.id, attempts = settled.attempts, "settled after retries");
                    }
                    if settled.drained {
                        break;
                    }
                }
                Verdict::Nack => {
                    metrics::cycles().add(1, &[KeyValue::new("outcome", "nack")]);
                    spans::record_outcome(&span, "nack");
                }
            }

            // Schedule the next cycle instead of running it inline, so pushers
            // and the caller just settled get to run in between.
            tokio::task::yield_now().await;
        }

        self.finished = true;
        debug!("drive task finished, queue idle");
    }
}

impl<T, E> Drop for Driver<T, E> {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.abandon();
        }
    }
}

async fn run_cycle<T, E>(inner: &Inner<T, E>, head: Request) -> Verdict<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let middleware = &inner.middleware;

    let request = match std::panic::catch_unwind(AssertUnwindSafe(|| middleware.request.handle(head))) {
        Ok(Ok(request)) => request,
        Ok(Err(source)) => {
            inner.notify_unhandled(Stage::Request, source);
            None
        }
        Err(payload) => {
            inner.notify_unhandled(Stage::Request, panicked(payload));
            None
        }
    };

    let mut result: Option<T> = None;
    let mut failure: Option<E> = None;

    match &request {
        None => debug!("exchange skipped"),
        Some(request) => match exchange(inner, request).await {
            Ok(response) => {
                let stage = AssertUnwindSafe(async { middleware.response.handle(response, request).await });
                match stage.catch_unwind().await {
                    Ok(Ok(value)) => result = Some(value),
                    Ok(Err(source)) => inner.notify_unhandled(Stage::Response, source),
                    Err(payload) => inner.notify_unhandled(Stage::Response, panicked(payload)),
                }
            }
            Err(error) => {
                debug!(%error, "exchange failed");
                let stage = AssertUnwindSafe(async { middleware.error.handle(error, request).await });
                match stage.catch_unwind().await {
                    Ok(Ok(value)) => failure = Some(value),
                    Ok(Err(source)) => inner.notify_unhandled(Stage::Error, source),
                    Err(payload) => inner.notify_unhandled(Stage::Error, panicked(payload)),
                }
            }
        },
    }

    let decision = AssertUnwindSafe(async {
        middleware
            .post_action
            .handle(failure.as_ref(), result.as_ref(), request.as_ref())
            .await
    })
    .catch_unwind()
    .await;

    let settle = |failure: Option<E>, result: Option<T>| match failure {
        Some(failure) => Err(failure),
        None => Ok(result),
    };

    match decision {
        Ok(Ok(())) => Verdict::Ack(settle(failure, result)),
        Ok(Err(reason)) => {
            warn!(stage = %Stage::PostAction, %reason, "request nacked, retrying");
            Verdict::Nack
        }
        // A panicking post-action would most likely panic again on a retry,
        // so it acknowledges.
        Err(payload) => {
            inner.notify_unhandled(Stage::PostAction, panicked(payload));
            Verdict::Ack(settle(failure, result))
        }
    }
}

/// Run the exchange, turning a transport panic into a transport error.
async fn exchange<T, E>(inner: &Inner<T, E>, request: &Request) -> Result<Response, Error> {
    AssertUnwindSafe(transport::exchange(&*inner.transport, request))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(Error::Transport(panicked(payload))))
}

fn panicked(payload: Box<dyn Any + Send>) -> BoxError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked: {message}").into()
}
