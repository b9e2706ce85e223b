//! # Bounded effect emission.
//!
//! Effects are one-shot values (navigation, toasts, ...) that are not part of the state.
//! Each accepted effect takes one of `C` capacity permits and keeps it until every
//! observer it was delivered to has received it.
//!
//! ```text
//! mutate / reduce ── EffectEmitter::emit ──► [staging queue] ──► pump ──► BroadcastChannel ──► observers
//!                          │                                        │                          │
//!                          ├─ no permit left ─► ControllerError::Effect                         │
//!                          │                                        └─ waits for an observer   │
//!                          └──────────── permit released when the last copy is received ◄──────┘
//! ```
//!
//! ## Rules
//! - At most `C` effects are undelivered at any time, whether staged or sitting unread in
//!   an observer's queue. The `(C+1)`-th is rejected with [`ControllerError::Effect`],
//!   reported through the escalation policy and returned to the caller. Nothing blocks,
//!   nothing is dropped silently.
//! - An effect nobody observes stays with the pump until an observer subscribes, even if
//!   the previous observer left while the pump was waiting.
//! - Effects are not replayed: an observer sees effects forwarded after it subscribed.
//! - After the controller is cancelled, `emit` is a silent no-op.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::channel::{BroadcastChannel, Hold};
use crate::error::ControllerError;
use crate::escalation::Reporter;
use crate::events::EventKind;

/// Default capacity of the effect queue.
pub const DEFAULT_EFFECT_CAPACITY: usize = 64;

/// Effect waiting for the pump, with the permit it occupies.
pub(crate) struct Queued<E> {
    effect: E,
    permit: OwnedSemaphorePermit,
}

/// Emission point for effects of one controller.
///
/// Cheap to clone; every clone shares the same capacity.
pub struct EffectEmitter<E> {
    tx: mpsc::Sender<Queued<E>>,
    permits: Arc<Semaphore>,
    capacity: usize,
    reporter: Arc<Reporter>,
    token: CancellationToken,
}

impl<E> Clone for EffectEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            permits: Arc::clone(&self.permits),
            capacity: self.capacity,
            reporter: Arc::clone(&self.reporter),
            token: self.token.clone(),
        }
    }
}

impl<E: fmt::Debug + Send + 'static> EffectEmitter<E> {
    /// Creates the emitter and the receiving end of its staging queue.
    ///
    /// `capacity` is clamped to a minimum of 1.
    pub(crate) fn bounded(
        capacity: usize,
        reporter: Arc<Reporter>,
        token: CancellationToken,
    ) -> (Self, mpsc::Receiver<Queued<E>>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let emitter = Self {
            tx,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            reporter,
            token,
        };
        (emitter, rx)
    }

    /// Enqueues an effect.
    ///
    /// ### Errors
    /// [`ControllerError::Effect`] if `capacity` effects are still undelivered.
    /// The error is also sent to the error logger and may escalate.
    pub fn emit(&self, effect: E) -> Result<(), ControllerError> {
        if self.token.is_cancelled() {
            return Ok(());
        }
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            return Err(self.overflow(&effect));
        };
        let detail = self
            .reporter
            .op_enabled()
            .then(|| format!("{effect:?}"));

        // Staging never fills before the permits run out.
        match self.tx.try_send(Queued { effect, permit }) {
            Ok(()) => {
                if let Some(detail) = detail {
                    self.reporter.op(EventKind::Effect, || detail);
                }
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(queued)) => Err(self.overflow(&queued.effect)),
            Err(mpsc::error::TrySendError::Closed(_)) => Ok(()),
        }
    }

    fn overflow(&self, effect: &E) -> ControllerError {
        let err = ControllerError::Effect {
            tag: Arc::clone(self.reporter.tag()),
            effect: format!("{effect:?}"),
            capacity: self.capacity,
        };
        self.reporter.report(err.clone());
        err
    }

    /// Capacity of the effect queue.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<E> fmt::Debug for EffectEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectEmitter")
            .field("capacity", &self.capacity)
            .field("undelivered", &(self.capacity - self.permits.available_permits()))
            .finish()
    }
}

/// Forwards staged effects to `out`, one at a time, until `token` is cancelled.
///
/// An effect is released only once at least one observer took it; while nobody
/// observes, the pump holds it and waits.
pub(crate) async fn pump<E: Clone + Send + 'static>(
    mut rx: mpsc::Receiver<Queued<E>>,
    out: BroadcastChannel<E>,
    token: CancellationToken,
) {
    'pump: loop {
        let queued = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = rx.recv() => match next {
                Some(queued) => queued,
                None => break,
            },
        };
        let hold: Hold = Arc::new(queued.permit);

        while out.deliver(&queued.effect, &hold) == 0 {
            if out.is_closed() {
                break 'pump;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => break 'pump,
                _ = out.observed() => {}
            }
        }
    }
    tracing::trace!("effect pump stopped");
}
