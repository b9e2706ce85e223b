//! Error types used by the statevisor runtime.
//!
//! This module defines three error enums:
//!
//! - [`ControllerError`] failures of user-supplied `mutate`/`reduce` code and
//!   effect buffer overflow, wrapped with enough context to diagnose them.
//! - [`RecvError`] why an observer handle stopped receiving values.
//! - [`ConfigError`] misuse of the process-wide configuration slot.
//!
//! All types provide `as_label` for logs/metrics, following the same convention.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Shared, cloneable cause of a wrapped failure.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced while a controller processes actions and mutations.
///
/// Every variant carries the controller `tag` plus a textual (`Debug`) rendering of
/// the values involved, so the error stays meaningful after those values are gone.
///
/// - `Mutate` and `Reduce` are recoverable: they are logged and the machine keeps
///   running unless escalation is enabled in [`Config`](crate::Config).
/// - `Effect` is returned to the emitting code **and** logged.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ControllerError {
    /// `mutate` failed (returned an error or panicked) while handling an action.
    #[error("[{tag}] mutate failed for action {action}: {cause}")]
    Mutate {
        /// Controller tag.
        tag: Arc<str>,
        /// `Debug` rendering of the action.
        action: String,
        /// Underlying failure.
        #[source]
        cause: Cause,
    },

    /// `reduce` failed (returned an error or panicked); the state was left untouched.
    #[error("[{tag}] reduce failed for state {state} with mutation {mutation}: {cause}")]
    Reduce {
        /// Controller tag.
        tag: Arc<str>,
        /// `Debug` rendering of the state the reducer was given.
        state: String,
        /// `Debug` rendering of the mutation.
        mutation: String,
        /// Underlying failure.
        #[source]
        cause: Cause,
    },

    /// The effect buffer was full when an effect was emitted.
    #[error("[{tag}] effect {effect} dropped: capacity of {capacity} exceeded")]
    Effect {
        /// Controller tag.
        tag: Arc<str>,
        /// `Debug` rendering of the rejected effect.
        effect: String,
        /// Configured capacity of the effect buffer.
        capacity: usize,
    },
}

impl ControllerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use statevisor::ControllerError;
    ///
    /// let err = ControllerError::Effect { tag: "demo".into(), effect: "Toast".into(), capacity: 4 };
    /// assert_eq!(err.as_label(), "controller_effect_overflow");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ControllerError::Mutate { .. } => "controller_mutate_failed",
            ControllerError::Reduce { .. } => "controller_reduce_failed",
            ControllerError::Effect { .. } => "controller_effect_overflow",
        }
    }

    /// Returns a human-readable message without the tag prefix.
    pub fn as_message(&self) -> String {
        match self {
            ControllerError::Mutate { action, cause, .. } => {
                format!("mutate: action={action} cause={cause}")
            }
            ControllerError::Reduce {
                state,
                mutation,
                cause,
                ..
            } => format!("reduce: state={state} mutation={mutation} cause={cause}"),
            ControllerError::Effect {
                effect, capacity, ..
            } => format!("effect: effect={effect} capacity={capacity}"),
        }
    }

    /// Returns the tag of the controller that raised this error.
    pub fn tag(&self) -> &str {
        match self {
            ControllerError::Mutate { tag, .. }
            | ControllerError::Reduce { tag, .. }
            | ControllerError::Effect { tag, .. } => tag,
        }
    }

    pub(crate) fn mutate(tag: &Arc<str>, action: String, cause: Cause) -> Self {
        ControllerError::Mutate {
            tag: Arc::clone(tag),
            action,
            cause,
        }
    }

    pub(crate) fn reduce(
        tag: &Arc<str>,
        state: &dyn fmt::Debug,
        mutation: &dyn fmt::Debug,
        cause: Cause,
    ) -> Self {
        ControllerError::Reduce {
            tag: Arc::clone(tag),
            state: format!("{state:?}"),
            mutation: format!("{mutation:?}"),
            cause,
        }
    }
}

/// Converts a failure returned by user code into a shared [`Cause`].
pub(crate) fn cause_from(err: anyhow::Error) -> Cause {
    let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
    Arc::from(boxed)
}

/// A panic caught while running user code.
#[derive(Error, Debug)]
#[error("panicked: {0}")]
pub(crate) struct Panicked(pub(crate) String);

impl Panicked {
    /// Extracts the panic message from a `catch_unwind` payload.
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Cause {
        let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Arc::new(Panicked(msg))
    }
}

/// # Why an observer handle stopped receiving values.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// The channel was closed (controller cancelled or channel dropped).
    #[error("channel closed")]
    Closed,

    /// The channel delivers exclusively and another observer already holds it.
    #[error("exclusive channel already has an observer")]
    Occupied,
}

impl RecvError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RecvError::Closed => "recv_closed",
            RecvError::Occupied => "recv_occupied",
        }
    }
}

/// # Errors raised by the process-wide configuration slot.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// [`Config::install`](crate::Config::install) was called more than once.
    #[error("process-wide config is already installed")]
    AlreadyInstalled,
}
