//! # Mutation context handed to `Machine::mutate`.
//!
//! One context per dispatched action. It is the only way for `mutate` to talk back
//! to its controller: emit mutations, emit effects, dispatch follow-up actions and
//! read the current state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::inner::Inner;
use crate::effects::EffectEmitter;
use crate::error::ControllerError;
use crate::machine::Machine;

/// Handle given to one `mutate` call.
///
/// The embedded token is a child of the controller scope: it is cancelled when the
/// controller is cancelled, and only then.
pub struct MutationContext<T: Machine> {
    inner: Arc<Inner<T>>,
    mutations: mpsc::UnboundedSender<T::Mutation>,
    token: CancellationToken,
}

impl<T: Machine> MutationContext<T> {
    pub(crate) fn new(
        inner: Arc<Inner<T>>,
        mutations: mpsc::UnboundedSender<T::Mutation>,
        token: CancellationToken,
    ) -> Self {
        Self {
            inner,
            mutations,
            token,
        }
    }

    /// Sends a mutation to the reduction loop.
    ///
    /// Mutations of one context are reduced in the order they are emitted.
    /// After cancellation this is a no-op.
    pub fn emit(&self, mutation: T::Mutation) {
        if self.token.is_cancelled() {
            return;
        }
        let _ = self.mutations.send(mutation);
    }

    /// Emits an effect; see [`EffectEmitter::emit`].
    pub fn emit_effect(&self, effect: T::Effect) -> Result<(), ControllerError> {
        self.inner.effects.emit(effect)
    }

    /// The controller's effect emitter.
    pub fn effects(&self) -> &EffectEmitter<T::Effect> {
        &self.inner.effects
    }

    /// Dispatches another action to the same controller (fire-and-forget).
    pub fn dispatch(&self, action: T::Action) {
        self.inner.dispatch(action);
    }

    /// Latest reduced state.
    pub fn current_state(&self) -> T::State {
        self.inner.snapshot()
    }

    /// Completes when the controller is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// True once the controller is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancellation token scoped to this `mutate` call.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Tag of the owning controller.
    pub fn tag(&self) -> &str {
        self.inner.reporter.tag()
    }
}
