//! Middleware stages threaded around every exchange.
//!
//! Four stages, each independently pluggable:
//!
//! - **request**: `(request) -> Option<request>`. Returning `None` skips the
//!   exchange for this cycle.
//! - **response**: `(response, &request) -> T`. Its value resolves the
//!   caller's future.
//! - **error**: `(error, &request) -> E`. Its value rejects the caller's
//!   future.
//! - **post-action**: `(Option<&E>, Option<&T>, Option<&request>) -> ()`.
//!   Returning an error is a nack: the head of the queue is kept and retried.
//!
//! Plain closures implement the stage traits. Asynchronous stages implement
//! the trait directly and return a boxed future.

pub mod combine;
pub mod retry;

pub use combine::Chain;
pub use futures::future::BoxFuture;
pub use retry::Retry;

use std::sync::Arc;

use crate::error::{BoxError, Error};
use crate::model::{Request, Response};

/// Identifies a middleware stage in errors, logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Request,
    Response,
    Error,
    PostAction,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Request => "request",
            Stage::Response => "response",
            Stage::Error => "error",
            Stage::PostAction => "post-action",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Stage traits
// ---------------------------------------------------------------------------

pub trait RequestMiddleware: Send + Sync {
    fn handle(&self, request: Request) -> Result<Option<Request>, BoxError>;
}

pub trait ResponseMiddleware<T>: Send + Sync {
    fn handle<'a>(
        &'a self,
        response: Response,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<T, BoxError>>;
}

pub trait ErrorMiddleware<E>: Send + Sync {
    fn handle<'a>(&'a self, error: Error, request: &'a Request)
    -> BoxFuture<'a, Result<E, BoxError>>;
}

pub trait PostActionMiddleware<T, E>: Send + Sync {
    fn handle<'a>(
        &'a self,
        error: Option<&'a E>,
        result: Option<&'a T>,
        request: Option<&'a Request>,
    ) -> BoxFuture<'a, Result<(), BoxError>>;
}

impl<F> RequestMiddleware for F
where
    F: Fn(Request) -> Result<Option<Request>, BoxError> + Send + Sync,
{
    fn handle(&self, request: Request) -> Result<Option<Request>, BoxError> {
        self(request)
    }
}

impl<T, F> ResponseMiddleware<T> for F
where
    F: Fn(Response, &Request) -> Result<T, BoxError> + Send + Sync,
    T: Send + 'static,
{
    fn handle<'a>(
        &'a self,
        response: Response,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<T, BoxError>> {
        Box::pin(std::future::ready(self(response, request)))
    }
}

impl<E, F> ErrorMiddleware<E> for F
where
    F: Fn(Error, &Request) -> Result<E, BoxError> + Send + Sync,
    E: Send + 'static,
{
    fn handle<'a>(
        &'a self,
        error: Error,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<E, BoxError>> {
        Box::pin(std::future::ready(self(error, request)))
    }
}

impl<T, E, F> PostActionMiddleware<T, E> for F
where
    F: Fn(Option<&E>, Option<&T>, Option<&Request>) -> Result<(), BoxError> + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        error: Option<&'a E>,
        result: Option<&'a T>,
        request: Option<&'a Request>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(std::future::ready(self(error, result, request)))
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Identity stage: hands its input back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl RequestMiddleware for Passthrough {
    fn handle(&self, request: Request) -> Result<Option<Request>, BoxError> {
        Ok(Some(request))
    }
}

impl ResponseMiddleware<Response> for Passthrough {
    fn handle<'a>(
        &'a self,
        response: Response,
        _request: &'a Request,
    ) -> BoxFuture<'a, Result<Response, BoxError>> {
        Box::pin(std::future::ready(Ok(response)))
    }
}

impl ErrorMiddleware<Error> for Passthrough {
    fn handle<'a>(
        &'a self,
        error: Error,
        _request: &'a Request,
    ) -> BoxFuture<'a, Result<Error, BoxError>> {
        Box::pin(std::future::ready(Ok(error)))
    }
}

/// Post-action that always acknowledges.
#[derive(Debug, Clone, Copy, Default)]
pub struct Acknowledge;

impl<T, E> PostActionMiddleware<T, E> for Acknowledge {
    fn handle<'a>(
        &'a self,
        _error: Option<&'a E>,
        _result: Option<&'a T>,
        _request: Option<&'a Request>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(std::future::ready(Ok(())))
    }
}

// ---------------------------------------------------------------------------
// Middleware set
// ---------------------------------------------------------------------------

/// The four stages a queue runs, passed to the queue at construction.
///
/// `T` is the value response middleware produces and `E` the value error
/// middleware produces. The default set uses [`Response`] and [`Error`] with
/// identity stages and an always-acknowledging post-action.
pub struct Middleware<T = Response, E = Error> {
    pub(crate) request: Arc<dyn RequestMiddleware>,
    pub(crate) response: Arc<dyn ResponseMiddleware<T>>,
    pub(crate) error: Arc<dyn ErrorMiddleware<E>>,
    pub(crate) post_action: Arc<dyn PostActionMiddleware<T, E>>,
}

impl<T, E> Clone for Middleware<T, E> {
    fn clone(&self) -> Self {
        Self {
            request: Arc::clone(&self.request),
            response: Arc::clone(&self.response),
            error: Arc::clone(&self.error),
            post_action: Arc::clone(&self.post_action),
        }
    }
}

impl Default for Middleware {
    fn default() -> Self {
        Self {
            request: Arc::new(Passthrough),
            response: Arc::new(Passthrough),
            error: Arc::new(Passthrough),
            post_action: Arc::new(Acknowledge),
        }
    }
}

impl<T, E> Middleware<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Build a set around custom response and error stages. Request and
    /// post-action start as [`Passthrough`] and [`Acknowledge`].
    pub fn new<R, X>(response: R, error: X) -> Self
    where
        R: Fn(Response, &Request) -> Result<T, BoxError> + Send + Sync + 'static,
        X: Fn(Error, &Request) -> Result<E, BoxError> + Send + Sync + 'static,
    {
        Self {
            request: Arc::new(Passthrough),
            response: Arc::new(response),
            error: Arc::new(error),
            post_action: Arc::new(Acknowledge),
        }
    }

    pub fn with_request<F>(self, f: F) -> Self
    where
        F: Fn(Request) -> Result<Option<Request>, BoxError> + Send + Sync + 'static,
    {
        self.with_request_middleware(f)
    }

    pub fn with_response<F>(self, f: F) -> Self
    where
        F: Fn(Response, &Request) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.with_response_middleware(f)
    }

    pub fn with_error<F>(self, f: F) -> Self
    where
        F: Fn(Error, &Request) -> Result<E, BoxError> + Send + Sync + 'static,
    {
        self.with_error_middleware(f)
    }

    pub fn with_post_action<F>(self, f: F) -> Self
    where
        F: Fn(Option<&E>, Option<&T>, Option<&Request>) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.with_post_action_middleware(f)
    }

    /// Replace the post-action with a [`Retry`] that re-runs a request
    /// while `is_failure` holds, at most `retries` extra times.
    pub fn with_retries<F>(self, retries: u32, is_failure: F) -> Self
    where
        F: Fn(Option<&E>, Option<&T>) -> bool + Send + Sync + 'static,
    {
        self.with_post_action_middleware(Retry::new(retries, is_failure))
    }

    pub fn with_request_middleware(mut self, m: impl RequestMiddleware + 'static) -> Self {
        self.request = Arc::new(m);
        self
    }

    pub fn with_response_middleware(mut self, m: impl ResponseMiddleware<T> + 'static) -> Self {
        self.response = Arc::new(m);
        self
    }

    pub fn with_error_middleware(mut self, m: impl ErrorMiddleware<E> + 'static) -> Self {
        self.error = Arc::new(m);
        self
    }

    pub fn with_post_action_middleware(
        mut self,
        m: impl PostActionMiddleware<T, E> + 'static,
    ) -> Self {
        self.post_action = Arc::new(m);
        self
    }
}
