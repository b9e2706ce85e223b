//! # Driver: the single task that owns reduction.
//!
//! ```text
//! dispatch(a) ──► [action queue] ──┐
//!                                  ▼
//!                     ┌──────── driver loop ────────┐
//!                     │ spawn mutate(a) per action  │──► JoinSet
//!                     │ reduce(m) one at a time     │◄── [mutation queue] ◄── ctx.emit(m)
//!                     └─────────────────────────────┘
//!                                  │
//!                                  ▼
//!                      current state + state channel
//! ```
//!
//! ## Rules
//! - Reductions happen only here, so they never overlap.
//! - Each mutate task feeds the shared mutation queue in its own order (FIFO per action);
//!   tasks of different actions interleave freely.
//! - Pending mutations are reduced before new actions are started.
//! - On cancellation the loop stops, mutate tasks are aborted and the controller finishes.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::context::MutationContext;
use super::inner::Inner;
use crate::error::{ControllerError, Panicked, cause_from};
use crate::machine::Machine;

pub(crate) async fn drive<T: Machine>(
    inner: Arc<Inner<T>>,
    mut actions: mpsc::UnboundedReceiver<T::Action>,
) {
    let token = inner.token.clone();
    let (mutations_tx, mut mutations) = mpsc::unbounded_channel::<T::Mutation>();
    let mut tasks: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,

            Some(mutation) = mutations.recv() => {
                inner.reduce(mutation);
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::debug!(tag = %inner.reporter.tag(), "mutate task ended abnormally: {e}");
                }
            }
            Some(action) = actions.recv() => {
                spawn_mutate(&inner, &mut tasks, &mutations_tx, action);
            }
        }
    }

    tasks.shutdown().await;
    inner.finish();
}

/// Runs `mutate(action)` as an independent task and reports its failure.
fn spawn_mutate<T: Machine>(
    inner: &Arc<Inner<T>>,
    tasks: &mut JoinSet<()>,
    mutations: &mpsc::UnboundedSender<T::Mutation>,
    action: T::Action,
) {
    let inner = Arc::clone(inner);
    let ctx = MutationContext::new(
        Arc::clone(&inner),
        mutations.clone(),
        inner.token.child_token(),
    );
    let described = format!("{action:?}");

    tasks.spawn(async move {
        let fut = inner.machine.mutate(&ctx, action);
        let cause = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => return,
            Ok(Err(err)) => {
                // Effect overflow was already reported where it happened.
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
        if ctx.is_cancelled() {
            return;
        }
        inner.reporter.report(ControllerError::mutate(
            inner.reporter.tag(),
            described,
            cause,
        ));
    });
}
