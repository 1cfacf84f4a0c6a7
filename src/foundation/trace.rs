use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRACE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide frame identifier, used for ordering and diagnostics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceId(pub u64);

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame-{}", self.0)
    }
}

/// Return a trace id strictly greater than every id handed out before, from any thread.
pub fn next_id() -> TraceId {
    TraceId(NEXT_TRACE_ID.fetch_add(1, Ordering::AcqRel))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/trace.rs"]
mod tests;
