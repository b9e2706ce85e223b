//! # Controller lifecycle status.
//!
//! ```text
//! NotStarted ──start──► Starting ──► Running ──cancel / escalation──► Cancelled
//!      │                                                                  ▲
//!      └──────────────────────────── cancel ──────────────────────────────┘
//! ```
//!
//! Transitions only move forward; `Cancelled` is terminal.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle status of a controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Built, holding only the initial state; no background activity.
    NotStarted = 0,
    /// Start in progress (transient).
    Starting = 1,
    /// Accepting actions and reducing mutations.
    Running = 2,
    /// Torn down; dispatches are dropped.
    Cancelled = 3,
}

impl Status {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Status::NotStarted,
            1 => Status::Starting,
            2 => Status::Running,
            _ => Status::Cancelled,
        }
    }
}

/// Lock-free status cell.
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Status::NotStarted as u8))
    }

    pub(crate) fn get(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from → to`; returns false if the current status is not `from`.
    pub(crate) fn transition(&self, from: Status, to: Status) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn set_cancelled(&self) {
        self.0.store(Status::Cancelled as u8, Ordering::Release);
    }
}
