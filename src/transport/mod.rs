//! The exchange collaborator: performs one HTTP round trip.
//!
//! The engine never talks to the network itself. It hands a URL and a
//! [`FetchOptions`] bundle to a [`Transport`] and turns the [`RawResponse`]
//! into a [`Response`].

pub mod http;

pub use http::HttpTransport;

use std::time::Instant;

use opentelemetry::KeyValue;
use serde_json::Value;
use tracing::debug;

use crate::error::{BoxError, Error, Result};
use crate::middleware::BoxFuture;
use crate::model::{Body, Headers, Method, RawResponse, Request, Response};
use crate::telemetry::metrics;

/// Options passed to the transport alongside the URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    pub method: Method,
    pub body: Option<Body>,
    pub headers: Headers,
    pub credentials: Option<Value>,
}

impl From<&Request> for FetchOptions {
    fn from(request: &Request) -> Self {
        Self {
            method: request.effective_method(),
            body: request.body.clone(),
            headers: request.headers.clone(),
            credentials: request.credentials.clone(),
        }
    }
}

/// Performs one exchange.
///
/// Implementations report network and protocol failures as `Err`. A
/// non-2xx status is still a successful exchange.
pub trait Transport: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        options: FetchOptions,
    ) -> BoxFuture<'a, std::result::Result<RawResponse, BoxError>>;
}

/// Validate the request, run the exchange and build the response payload.
pub(crate) async fn exchange(transport: &dyn Transport, request: &Request) -> Result<Response> {
    let url = match request.url.as_deref() {
        Some(url) if !url.is_empty() => url,
        _ => return Err(Error::MissingUrl),
    };
    let options = FetchOptions::from(request);
    let method = options.method.clone();

    let start = Instant::now();
    let outcome = transport.fetch(url, options).await;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    metrics::exchange_duration_ms().record(
        duration_ms,
        &[
            KeyValue::new(metrics::HTTP_METHOD, method.to_string()),
            KeyValue::new("result", if outcome.is_ok() { "ok" } else { "error" }),
        ],
    );

    let raw = outcome.map_err(Error::Transport)?;
    debug!(%method, url, status = raw.status, duration_ms, "exchange finished");
    Ok(Response::from(raw))
}
