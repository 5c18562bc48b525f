//! Drive-cycle span helpers.

use tracing::Span;
use uuid::Uuid;

use crate::model::Request;

/// Start a span for one drive cycle of a queued request.
///
/// `cycle.outcome` is declared empty and filled in by [`record_outcome`].
pub fn start_cycle_span(entry_id: &Uuid, request: &Request, attempt: u32) -> Span {
    tracing::info_span!(
        "request.cycle",
        "request.id" = %entry_id,
        "request.method" = %request.effective_method(),
        "request.url" = request.url.as_deref().unwrap_or(""),
        "request.attempt" = attempt,
        "cycle.outcome" = tracing::field::Empty,
    )
}

/// Record how the cycle ended ("resolved", "rejected", "nack").
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("cycle.outcome", outcome);
    span.in_scope(|| {
        tracing::debug!(outcome, "cycle finished");
    });
}
