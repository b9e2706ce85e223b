//! # Shared controller core.
//!
//! [`Inner`] is the state shared by the public [`Controller`](super::Controller) handles,
//! the driver task and every [`MutationContext`](super::MutationContext).
//!
//! ## Memory model
//! - `current` is the only mutable shared cell. It is written exclusively by the driver
//!   (single writer) and read by anyone (`current_state`, `state`).
//! - A new state is stored and broadcast inside one write section, while `state()`
//!   snapshots and subscribes inside one read section: a state stream never misses a
//!   value nor sees one twice.
//! - The receiving ends of the action and effect queues sit in `pipeline` until start
//!   takes them (once).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::driver;
use super::status::{Status, StatusCell};
use crate::channel::{BroadcastChannel, Subscription};
use crate::config::ControllerStart;
use crate::effects::{self, EffectEmitter, Queued};
use crate::error::{ControllerError, Panicked, cause_from};
use crate::escalation::Reporter;
use crate::events::EventKind;
use crate::machine::Machine;

/// Receiving ends consumed by `start`.
pub(crate) struct Pipeline<T: Machine> {
    pub(crate) actions: mpsc::UnboundedReceiver<T::Action>,
    pub(crate) effects: mpsc::Receiver<Queued<T::Effect>>,
}

pub(crate) struct Inner<T: Machine> {
    pub(crate) machine: T,
    pub(crate) start: ControllerStart,
    pub(crate) status: StatusCell,
    pub(crate) current: RwLock<Arc<T::State>>,
    pub(crate) states: BroadcastChannel<T::State>,
    pub(crate) effects_out: BroadcastChannel<T::Effect>,
    pub(crate) effects: EffectEmitter<T::Effect>,
    pub(crate) actions: mpsc::UnboundedSender<T::Action>,
    pub(crate) pipeline: Mutex<Option<Pipeline<T>>>,
    pub(crate) reporter: Arc<Reporter>,
    /// Controller scope; cancelling it tears everything down.
    pub(crate) token: CancellationToken,
    /// Cancelled once teardown is complete.
    pub(crate) done: CancellationToken,
    pub(crate) handle: Handle,
}

impl<T: Machine> Inner<T> {
    /// `NotStarted → Running`. Returns true only for the call that performed the start.
    pub(crate) fn start(self: &Arc<Self>) -> bool {
        if !self.status.transition(Status::NotStarted, Status::Starting) {
            return false;
        }
        if self.token.is_cancelled() {
            self.finish();
            return false;
        }
        let Some(pipeline) = self.pipeline.lock().take() else {
            self.finish();
            return false;
        };

        self.reporter
            .op(EventKind::Started, || format!("start={:?}", self.start));
        self.handle.spawn(effects::pump(
            pipeline.effects,
            self.effects_out.clone(),
            self.token.clone(),
        ));
        self.handle
            .spawn(driver::drive(Arc::clone(self), pipeline.actions));

        self.status.transition(Status::Starting, Status::Running);
        true
    }

    /// Starts the pipeline if the start discipline is `Lazy`.
    pub(crate) fn start_lazily(self: &Arc<Self>) {
        if self.start == ControllerStart::Lazy && self.status.get() == Status::NotStarted {
            self.start();
        }
    }

    pub(crate) fn dispatch(self: &Arc<Self>, action: T::Action) {
        if self.token.is_cancelled() {
            return;
        }
        self.start_lazily();
        self.reporter.op(EventKind::Action, || format!("{action:?}"));
        let _ = self.actions.send(action);
    }

    /// Latest state without triggering a start.
    pub(crate) fn snapshot(&self) -> T::State {
        <T::State as Clone>::clone(&self.current.read())
    }

    /// Subscription yielding the current state, then every later one.
    pub(crate) fn state_stream(&self) -> Subscription<T::State> {
        let current = self.current.read();
        let sub = self.states.subscribe();
        sub.with_initial(<T::State as Clone>::clone(&current))
    }

    /// Applies one mutation. Called only from the driver task.
    pub(crate) fn reduce(&self, mutation: T::Mutation) {
        self.reporter.op(EventKind::Mutation, || format!("{mutation:?}"));

        let prev: Arc<T::State> = self.current.read().clone();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.machine.reduce(&prev, &mutation, &self.effects)
        }));

        let cause = match outcome {
            Ok(Ok(next)) => {
                let next = Arc::new(next);
                {
                    let mut current = self.current.write();
                    *current = Arc::clone(&next);
                    self.states.emit(<T::State as Clone>::clone(&next));
                }
                self.reporter.op(EventKind::State, || format!("{next:?}"));
                return;
            }
            Ok(Err(err)) => {
                if matches!(
                    err.downcast_ref::<ControllerError>(),
                    Some(ControllerError::Effect { .. })
                ) {
                    return;
                }
                cause_from(err)
            }
            Err(payload) => Panicked::from_payload(payload),
        };
        self.reporter.report(ControllerError::reduce(
            self.reporter.tag(),
            &*prev,
            &mutation,
            cause,
        ));
    }

    /// Cancels the scope; finishes immediately when the pipeline never ran.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
        self.reap();
    }

    /// Finishes a cancelled controller whose pipeline never ran (no driver to do it).
    pub(crate) fn reap(&self) {
        if self.token.is_cancelled()
            && self.status.transition(Status::NotStarted, Status::Cancelled)
        {
            self.finish();
        }
    }

    /// Final teardown: close every outlet and release `closed()` waiters.
    pub(crate) fn finish(&self) {
        self.status.set_cancelled();
        self.states.close();
        self.effects_out.close();
        self.reporter.op(EventKind::Completed, || {
            self.reporter
                .fatal()
                .map(|e| e.to_string())
                .unwrap_or_default()
        });
        self.done.cancel();
    }
}
