//! # Operation events emitted by controllers.
//!
//! The [`EventKind`] enum classifies what a controller just did.
//! The [`Event`] struct carries a timestamp, the controller tag and an optional
//! free-form detail (usually the `Debug` rendering of the value involved).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events from several controllers are merged.
//!
//! ## Example
//! ```rust
//! use statevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::Action)
//!     .with_tag("counter")
//!     .with_detail("Increase");
//!
//! assert_eq!(ev.kind, EventKind::Action);
//! assert_eq!(ev.tag.as_deref(), Some("counter"));
//! assert_eq!(ev.detail.as_deref(), Some("Increase"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of operation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle ===
    /// Controller was built.
    ///
    /// Sets:
    /// - `detail`: start discipline
    Created,

    /// Pipeline started (`NotStarted → Running`).
    ///
    /// Sets:
    /// - `detail`: start discipline
    Started,

    /// Pipeline stopped (cancel, scope teardown or escalation).
    ///
    /// Sets:
    /// - `detail`: escalated error, if any
    Completed,

    // === Data flow ===
    /// Action accepted by `dispatch`.
    ///
    /// Sets:
    /// - `detail`: action
    Action,

    /// Mutation about to be reduced.
    ///
    /// Sets:
    /// - `detail`: mutation
    Mutation,

    /// New state stored and broadcast.
    ///
    /// Sets:
    /// - `detail`: state
    State,

    /// Effect accepted by the effect buffer.
    ///
    /// Sets:
    /// - `detail`: effect
    Effect,

    /// A wrapped failure was reported.
    ///
    /// Sets:
    /// - `detail`: error message
    Error,
}

impl EventKind {
    /// Returns a short stable label for log lines.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Started => "started",
            EventKind::Completed => "completed",
            EventKind::Action => "action",
            EventKind::Mutation => "mutation",
            EventKind::State => "state",
            EventKind::Effect => "effect",
            EventKind::Error => "error",
        }
    }
}

/// Operation event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Tag of the emitting controller.
    pub tag: Option<Arc<str>>,
    /// Human-readable detail (value rendering, error message).
    pub detail: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            tag: None,
            detail: None,
        }
    }

    /// Attaches the controller tag.
    #[inline]
    pub fn with_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Attaches a detail string.
    #[inline]
    pub fn with_detail(mut self, detail: impl Into<Arc<str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
