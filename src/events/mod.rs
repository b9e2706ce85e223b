//! Operation events: data model and the built-in log writer.
//!
//! Controllers describe what they are doing as a sequence of [`Event`]s
//! (created, started, action, mutation, state, effect, error, completed).
//! Events are only produced when [`Config::op_logging`](crate::Config::op_logging)
//! is enabled and are handed to the configured op logger, or to [`LogWriter`].
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`LogWriter`] renders events through `tracing`

mod event;
mod log;

pub use event::{Event, EventKind};
pub use log::LogWriter;
