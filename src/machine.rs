//! # Machine: the user-supplied behaviour of a controller.
//!
//! A [`Machine`] bundles the two functions a [`Controller`](crate::Controller) drives:
//!
//! - [`mutate`](Machine::mutate) turns one action into zero or more mutations. It is
//!   async, may sleep or do I/O, and may emit effects or dispatch further actions.
//!   Every dispatched action gets its own concurrent `mutate` call.
//! - [`reduce`](Machine::reduce) folds one mutation into the previous state. It is
//!   synchronous and never runs concurrently with itself.
//!
//! Actions, mutations and states are plain values, typically enums and structs.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::core::MutationContext;
use crate::effects::EffectEmitter;

/// # Transform + reduce pair parameterized over its value types.
///
/// Failures are reported through `anyhow::Result`; panics are caught as well. Both are
/// wrapped into [`ControllerError`](crate::ControllerError) and handed to the escalation policy.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use statevisor::{EffectEmitter, Machine, MutationContext};
///
/// struct Counter;
///
/// #[derive(Debug)]
/// enum Action { Add(i64) }
///
/// #[derive(Debug)]
/// enum Mutation { Added(i64) }
///
/// #[async_trait]
/// impl Machine for Counter {
///     type Action = Action;
///     type Mutation = Mutation;
///     type State = i64;
///     type Effect = ();
///
///     async fn mutate(&self, ctx: &MutationContext<Self>, action: Action) -> anyhow::Result<()> {
///         match action {
///             Action::Add(n) => ctx.emit(Mutation::Added(n)),
///         }
///         Ok(())
///     }
///
///     fn reduce(&self, state: &i64, mutation: &Mutation, _fx: &EffectEmitter<()>) -> anyhow::Result<i64> {
///         match mutation {
///             Mutation::Added(n) => Ok(state + n),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Machine: Sized + Send + Sync + 'static {
    /// Externally triggered input.
    type Action: Debug + Send + 'static;

    /// Intermediate event produced by `mutate` and consumed by `reduce`.
    type Mutation: Debug + Send + 'static;

    /// Immutable snapshot observed by callers.
    type State: Debug + Clone + Send + Sync + 'static;

    /// One-shot side event; use `()` when the machine has none.
    type Effect: Debug + Clone + Send + 'static;

    /// Produces mutations for `action` through `ctx.emit`.
    ///
    /// Runs concurrently with other `mutate` calls. Implementations that wait should
    /// also watch `ctx.cancelled()`; the task is aborted on teardown regardless.
    async fn mutate(&self, ctx: &MutationContext<Self>, action: Self::Action) -> anyhow::Result<()>;

    /// Returns the state that follows `state` after `mutation`.
    ///
    /// On `Err` (or panic) the controller keeps `state` as current.
    fn reduce(
        &self,
        state: &Self::State,
        mutation: &Self::Mutation,
        effects: &EffectEmitter<Self::Effect>,
    ) -> anyhow::Result<Self::State>;
}
