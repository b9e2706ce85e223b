//! # Failure reporting and escalation.
//!
//! Every wrapped failure of a controller goes through one [`Reporter`]:
//!
//! ```text
//! mutate / reduce / effect overflow
//!        │
//!        ▼
//!  Reporter::report(err)
//!        ├─► Config::log_error(err)        (always)
//!        ├─► op event `Error`              (if op logging)
//!        └─► escalate?
//!              ├─ no  ─► return, machine keeps last good state
//!              └─ yes ─► remember err, cancel controller token
//! ```
//!
//! The first escalated error wins; later ones are logged but not stored.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ControllerError;
use crate::events::{Event, EventKind};

/// Per-controller sink for failures and operation events.
pub(crate) struct Reporter {
    tag: Arc<str>,
    config: Config,
    token: CancellationToken,
    fatal: Mutex<Option<ControllerError>>,
}

impl Reporter {
    pub(crate) fn new(tag: Arc<str>, config: Config, token: CancellationToken) -> Self {
        Self {
            tag,
            config,
            token,
            fatal: Mutex::new(None),
        }
    }

    pub(crate) fn tag(&self) -> &Arc<str> {
        &self.tag
    }

    /// Logs `err` and applies the escalation policy.
    pub(crate) fn report(&self, err: ControllerError) {
        self.config.log_error(&err);
        self.op(EventKind::Error, || err.to_string());

        if !self.config.escalate {
            return;
        }
        {
            let mut fatal = self.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
        self.token.cancel();
    }

    /// True when operation events are produced.
    pub(crate) fn op_enabled(&self) -> bool {
        self.config.op_logging
    }

    /// Emits an operation event; `detail` is only evaluated when op logging is on.
    pub(crate) fn op(&self, kind: EventKind, detail: impl FnOnce() -> String) {
        if !self.op_enabled() {
            return;
        }
        let ev = Event::new(kind)
            .with_tag(Arc::clone(&self.tag))
            .with_detail(detail());
        self.config.log_op(&ev);
    }

    /// The escalated error that terminated the controller, if any.
    pub(crate) fn fatal(&self) -> Option<ControllerError> {
        self.fatal.lock().clone()
    }
}
