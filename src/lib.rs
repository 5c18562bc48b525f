//! # fetchq
//!
//! Serialized HTTP request queue.
//!
//! Requests pushed onto a [`Queue`] run one at a time, in push order, through
//! pluggable request, response, error and post-action middleware. A failing
//! post-action keeps the request at the head of the queue and retries it.
//!
//! ```no_run
//! use fetchq::{HttpTransport, Queue, Request};
//!
//! # async fn demo() -> fetchq::Result<()> {
//! let queue = Queue::new(HttpTransport::default())?;
//! let first = queue.get(Request::new("https://example.com/a"));
//! let second = queue.post(Request::new("https://example.com/b").body("payload"));
//! let (first, second) = (first.await?, second.await?);
//! # let _ = (first, second);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod deferred;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod model;
pub mod telemetry;
pub mod transport;

pub use deferred::{Deferred, Pending};
pub use engine::{Queue, State};
pub use error::{BoxError, Error, Result};
pub use middleware::{Chain, Middleware, Stage};
pub use model::{Body, Headers, Method, RawResponse, Request, Response};
pub use transport::{FetchOptions, HttpTransport, Transport};
