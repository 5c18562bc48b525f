//! Metric instrument factories for fetchq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one installed, the instruments are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Attribute key for the HTTP verb.
pub const HTTP_METHOD: &str = opentelemetry_semantic_conventions::attribute::HTTP_REQUEST_METHOD;

fn meter() -> Meter {
    opentelemetry::global::meter("fetchq")
}

/// Counter: requests pushed onto a queue.
/// Labels: `http.request.method`.
pub fn requests_pushed() -> Counter<u64> {
    meter()
        .u64_counter("fetchq.requests.pushed")
        .with_description("Number of requests pushed onto a queue")
        .build()
}

/// Counter: completed drive cycles.
/// Labels: `outcome` ("ack" | "nack").
pub fn cycles() -> Counter<u64> {
    meter()
        .u64_counter("fetchq.cycles")
        .with_description("Number of drive cycles run")
        .build()
}

/// Counter: middleware failures delivered to unhandled-error listeners.
/// Labels: `stage`.
pub fn unhandled_errors() -> Counter<u64> {
    meter()
        .u64_counter("fetchq.middleware.unhandled")
        .with_description("Number of middleware failures reported as unhandled")
        .build()
}

/// Histogram: transport exchange duration in milliseconds.
/// Labels: `http.request.method`, `result` ("ok" | "error").
pub fn exchange_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("fetchq.exchange.duration_ms")
        .with_description("Transport exchange duration in milliseconds")
        .with_unit("ms")
        .build()
}
