//! # Controller construction.
//!
//! [`ControllerBuilder`] collects optional settings and wires one controller together:
//! reporter, bounded effect emitter, action queue and the shared core. A `Created` op
//! event is emitted on `build()`; `Immediate` controllers start right there.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::controller::Controller;
use super::inner::{Inner, Pipeline};
use super::status::StatusCell;
use crate::channel::{BroadcastChannel, Delivery};
use crate::config::{Config, ControllerStart};
use crate::effects::{DEFAULT_EFFECT_CAPACITY, EffectEmitter};
use crate::escalation::Reporter;
use crate::events::EventKind;
use crate::machine::Machine;

/// Builder for constructing a [`Controller`] with optional settings.
pub struct ControllerBuilder<T: Machine> {
    machine: T,
    initial: T::State,
    tag: Option<Arc<str>>,
    start: ControllerStart,
    config: Option<Config>,
    scope: Option<CancellationToken>,
    effect_capacity: usize,
    effect_delivery: Delivery,
    handle: Option<Handle>,
}

impl<T: Machine> ControllerBuilder<T> {
    /// Creates a new builder for `machine` starting from `initial`.
    pub fn new(machine: T, initial: T::State) -> Self {
        Self {
            machine,
            initial,
            tag: None,
            start: ControllerStart::default(),
            config: None,
            scope: None,
            effect_capacity: DEFAULT_EFFECT_CAPACITY,
            effect_delivery: Delivery::Shared,
            handle: None,
        }
    }

    /// Diagnostic tag used in errors and operation events.
    ///
    /// Defaults to the machine's type name.
    pub fn with_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Startup discipline (default [`ControllerStart::Lazy`]).
    pub fn with_start(mut self, start: ControllerStart) -> Self {
        self.start = start;
        self
    }

    /// Pins a config to this controller instead of snapshotting [`Config::global`].
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Owning scope: cancelling `scope` tears the controller down.
    ///
    /// The controller runs under a child token, so cancelling the controller
    /// never cancels the scope.
    pub fn with_scope(mut self, scope: &CancellationToken) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    /// Capacity of the effect queue (default 64, minimum 1).
    pub fn with_effect_capacity(mut self, capacity: usize) -> Self {
        self.effect_capacity = capacity;
        self
    }

    /// Delivery discipline of [`Controller::effects`] (default [`Delivery::Shared`]).
    pub fn with_effect_delivery(mut self, delivery: Delivery) -> Self {
        self.effect_delivery = delivery;
        self
    }

    /// Runtime on which the controller spawns its tasks.
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Builds the controller.
    ///
    /// Starts it right away for [`ControllerStart::Immediate`].
    ///
    /// # Panics
    /// Without [`with_handle`](Self::with_handle), must be called from within a Tokio runtime.
    pub fn build(self) -> Controller<T> {
        let config = self.config.unwrap_or_else(Config::global);
        let tag = self.tag.unwrap_or_else(default_tag::<T>);
        let token = match &self.scope {
            Some(scope) => scope.child_token(),
            None => CancellationToken::new(),
        };
        let handle = self.handle.unwrap_or_else(Handle::current);

        let reporter = Arc::new(Reporter::new(Arc::clone(&tag), config, token.clone()));
        let (effects, effects_rx) =
            EffectEmitter::bounded(self.effect_capacity, Arc::clone(&reporter), token.clone());
        let (actions, actions_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            machine: self.machine,
            start: self.start,
            status: StatusCell::new(),
            current: RwLock::new(Arc::new(self.initial)),
            states: BroadcastChannel::new(Delivery::Shared),
            effects_out: BroadcastChannel::new(self.effect_delivery),
            effects,
            actions,
            pipeline: Mutex::new(Some(Pipeline {
                actions: actions_rx,
                effects: effects_rx,
            })),
            reporter,
            token,
            done: CancellationToken::new(),
            handle,
        });

        inner
            .reporter
            .op(EventKind::Created, || format!("start={:?}", self.start));

        let controller = Controller::from_inner(inner);
        if self.start == ControllerStart::Immediate {
            controller.start();
        }
        controller
    }
}

/// Last path segment of the machine's type name.
fn default_tag<T>() -> Arc<str> {
    let full = std::any::type_name::<T>();
    let short = full.rsplit("::").next().unwrap_or(full);
    Arc::from(short)
}
