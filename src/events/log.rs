//! # LogWriter: operation event printer
//!
//! Renders incoming [`Event`]s as `tracing` records. Used when op logging is
//! enabled but no custom op logger is configured.
//!
//! ## Example output
//! ```text
//! [created] controller="counter" start=Lazy
//! [action] controller="counter" Increase
//! [mutation] controller="counter" SetLoading(true)
//! [state] controller="counter" State { value: 0, loading: true }
//! [completed] controller="counter"
//! ```

use crate::events::{Event, EventKind};

/// Event writer backed by `tracing`.
#[derive(Default, Clone, Copy, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Writes one event.
    pub fn write(&self, e: &Event) {
        let tag = e.tag.as_deref().unwrap_or("unknown");
        let detail = e.detail.as_deref().unwrap_or("");
        let label = e.kind.as_label();

        match e.kind {
            EventKind::Error => {
                tracing::warn!(seq = e.seq, "[{label}] controller={tag:?} {detail}");
            }
            EventKind::Created | EventKind::Started | EventKind::Completed => {
                tracing::info!(seq = e.seq, "[{label}] controller={tag:?} {detail}");
            }
            EventKind::Action | EventKind::Mutation | EventKind::State | EventKind::Effect => {
                tracing::debug!(seq = e.seq, "[{label}] controller={tag:?} {detail}");
            }
        }
    }
}
