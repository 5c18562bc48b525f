//! Tests for telemetry initialization and span helpers.

use fetchq::Request;
use fetchq::telemetry::{TelemetryConfig, init_telemetry, request};
use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // Only one global subscriber can exist per process; an Err here means
    // another test got there first, which is acceptable.
    if let Ok(guard) = init_telemetry(TelemetryConfig::new("fetchq-test")) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn cycle_span_records_outcome() {
    let request = Request::new("http://test/");
    let span = request::start_cycle_span(&Uuid::new_v4(), &request, 1);
    request::record_outcome(&span, "resolved");
}
