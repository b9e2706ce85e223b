//! # statevisor
//!
//! **Statevisor** is a unidirectional state machine runtime for async Rust.
//!
//! A [`Machine`] describes behaviour as two functions: an async `mutate` that turns
//! actions into mutations, and a synchronous `reduce` that folds mutations into an
//! immutable state. A [`Controller`] drives the pair: it accepts actions from any
//! thread, runs one `mutate` per action concurrently, reduces mutations one at a
//! time and multicasts every new state to its observers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   caller A   │   │   caller B   │   │   mutate()   │
//!     │ dispatch(a1) │   │ dispatch(a2) │   │ ctx.dispatch │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Controller (cloneable handle)                                    │
//! │  - action queue (unbounded, FIFO)                                 │
//! │  - status (NotStarted → Running → Cancelled)                      │
//! │  - Reporter (error logger + escalation policy)                    │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  driver task                                                      │
//! │  - spawns mutate(ctx, action) per action ──► JoinSet              │
//! │  - reduces mutations from every context, one at a time            │
//! └──────┬─────────────────────────────────────────────────┬──────────┘
//!        ▼                                                 ▼
//! ┌──────────────────────────┐               ┌──────────────────────────┐
//! │ state BroadcastChannel   │               │ bounded effect queue (C) │
//! │ (per-observer queues)    │               │  └─► pump (when observed)│
//! └───┬──────────┬───────────┘               │  └─► effect channel      │
//!     ▼          ▼                           └──────────┬───────────────┘
//!   obs1       obs2                                     ▼
//!                                                 effect observers
//! ```
//!
//! ### Lifecycle
//! ```text
//! builder ──► build() ──► NotStarted
//!                             │  Lazy: first dispatch / current_state / state
//!                             │  Immediate: inside build()
//!                             │  Manual: start()
//!                             ▼
//!                          Running ──► cancel() | scope cancelled | escalation | last handle dropped
//!                                                         │
//!                                                         ▼
//!                                  abort mutate tasks, close streams ──► Cancelled
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                            |
//! |-------------------|---------------------------------------------------------------|-----------------------------------------------|
//! | **Machines**      | Define behaviour as transform + reduce.                       | [`Machine`], [`MutationContext`]              |
//! | **Control**       | Build, start, dispatch, observe, cancel.                      | [`Controller`], [`ControllerBuilder`]         |
//! | **Channels**      | Multicast with no replay, shared or exclusive delivery.       | [`BroadcastChannel`], [`Subscription`]        |
//! | **Effects**       | Bounded one-shot side events with overflow reporting.         | [`EffectEmitter`]                             |
//! | **Errors**        | Wrapped failures of user code, observer errors.               | [`ControllerError`], [`RecvError`]            |
//! | **Configuration** | Error/op loggers and escalation, per controller or global.    | [`Config`], [`ControllerStart`]               |
//! | **Op events**     | Optional trace of everything a controller does.               | [`Event`], [`EventKind`], [`LogWriter`]       |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use statevisor::{Config, Controller, EffectEmitter, Machine, MutationContext};
//!
//! struct Counter;
//!
//! #[derive(Debug)]
//! enum Action { Increase }
//!
//! #[derive(Debug)]
//! enum Mutation { Add(i64), SetLoading(bool) }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct State { value: i64, loading: bool }
//!
//! #[async_trait]
//! impl Machine for Counter {
//!     type Action = Action;
//!     type Mutation = Mutation;
//!     type State = State;
//!     type Effect = ();
//!
//!     async fn mutate(&self, ctx: &MutationContext<Self>, action: Action) -> anyhow::Result<()> {
//!         match action {
//!             Action::Increase => {
//!                 ctx.emit(Mutation::SetLoading(true));
//!                 tokio::time::sleep(Duration::from_millis(10)).await;
//!                 ctx.emit(Mutation::Add(1));
//!                 ctx.emit(Mutation::SetLoading(false));
//!             }
//!         }
//!         Ok(())
//!     }
//!
//!     fn reduce(&self, state: &State, m: &Mutation, _fx: &EffectEmitter<()>) -> anyhow::Result<State> {
//!         let mut next = state.clone();
//!         match m {
//!             Mutation::Add(n) => next.value += n,
//!             Mutation::SetLoading(l) => next.loading = *l,
//!         }
//!         Ok(next)
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let ctl = Controller::builder(Counter, State { value: 0, loading: false })
//!         .with_config(Config::default())
//!         .build();
//!
//!     let mut states = ctl.state();
//!     ctl.dispatch(Action::Increase);
//!
//!     while let Ok(state) = states.recv().await {
//!         if state == (State { value: 1, loading: false }) {
//!             break;
//!         }
//!     }
//!     ctl.cancel();
//!     assert!(ctl.closed().await.is_none());
//! }
//! ```
mod channel;
mod config;
mod core;
mod effects;
mod error;
mod escalation;
mod events;
mod machine;

// ---- Public re-exports ----

pub use channel::{BroadcastChannel, Delivery, Subscription};
pub use config::{Config, ControllerStart, ErrorLogger, OpLogger};
pub use core::{Controller, ControllerBuilder, MutationContext, Status};
pub use effects::{DEFAULT_EFFECT_CAPACITY, EffectEmitter};
pub use error::{Cause, ConfigError, ControllerError, RecvError};
pub use events::{Event, EventKind, LogWriter};
pub use machine::Machine;
