//! Shared test transport.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fetchq::middleware::BoxFuture;
use fetchq::{BoxError, FetchOptions, Headers, RawResponse, Transport};
use serde_json::Value;

/// How the mock answers one exchange.
pub enum Reply {
    Status(u16),
    Json(Value),
    Fail(&'static str),
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn delayed(ms: u64, reply: Reply) -> Self {
        Reply::Delayed(Duration::from_millis(ms), Box::new(reply))
    }
}

/// In-process transport that records every call.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

struct MockInner {
    calls: Mutex<Vec<(String, FetchOptions)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    respond: Box<dyn Fn(&str) -> Reply + Send + Sync>,
}

impl MockTransport {
    pub fn new(respond: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(MockInner {
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                respond: Box::new(respond),
            }),
        }
    }

    /// Answers every exchange with an empty 200.
    pub fn ok() -> Self {
        Self::new(|_| Reply::Status(200))
    }

    /// URLs in the order the transport saw them.
    pub fn urls(&self) -> Vec<String> {
        self.inner.calls.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn options(&self) -> Vec<FetchOptions> {
        self.inner.calls.lock().unwrap().iter().map(|(_, o)| o.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    /// Highest number of exchanges observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self, url: String, mut reply: Reply) -> Result<RawResponse, BoxError> {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = loop {
            match reply {
                Reply::Delayed(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
                Reply::Status(status) => {
                    break Ok(RawResponse {
                        status,
                        status_text: String::new(),
                        headers: Headers::new(),
                        url,
                        text: String::new(),
                    });
                }
                Reply::Json(value) => {
                    break Ok(RawResponse {
                        status: 200,
                        status_text: "OK".to_string(),
                        headers: [("Content-Type", "application/json")].into_iter().collect(),
                        url,
                        text: value.to_string(),
                    });
                }
                Reply::Fail(message) => break Err(BoxError::from(message)),
            }
        };

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

impl Transport for MockTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        options: FetchOptions,
    ) -> BoxFuture<'a, Result<RawResponse, BoxError>> {
        self.inner
            .calls
            .lock()
            .unwrap()
            .push((url.to_string(), options));
        let reply = (self.inner.respond)(url);
        Box::pin(self.answer(url.to_string(), reply))
    }
}
