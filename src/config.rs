//! # Runtime configuration and escalation policy.
//!
//! Provides [`Config`] centralized logging/escalation settings for controllers and
//! [`ControllerStart`] the startup discipline of a single controller.
//!
//! Config is used in two ways:
//! 1. **Explicitly**: `ControllerBuilder::with_config(cfg)` pins a config to one controller.
//! 2. **Process-wide**: `Config::install(cfg)` once at startup; every controller built
//!    afterwards without an explicit config snapshots [`Config::global`].
//!
//! ## Fallbacks
//! - `error_logger = None` → errors go to `tracing::error!`
//! - `op_logging = true` with `op_logger = None` → events go to [`LogWriter`]

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{ConfigError, ControllerError};
use crate::events::{Event, LogWriter};

/// Callback receiving every [`ControllerError`] raised by a controller.
pub type ErrorLogger = Arc<dyn Fn(&ControllerError) + Send + Sync>;

/// Callback receiving every operation [`Event`] when op logging is enabled.
pub type OpLogger = Arc<dyn Fn(&Event) + Send + Sync>;

static GLOBAL: OnceLock<Config> = OnceLock::new();

/// Logging and escalation settings shared by controllers.
///
/// ## Field semantics
/// - `error_logger`: sink for wrapped failures (`None` = `tracing::error!`)
/// - `op_logger`: sink for operation events (`None` = built-in [`LogWriter`])
/// - `op_logging`: master switch for operation events (off by default)
/// - `escalate`: turn "log and continue" into "log and cancel the controller"
#[derive(Clone, Default)]
pub struct Config {
    /// Custom error sink.
    pub error_logger: Option<ErrorLogger>,

    /// Custom operation-event sink.
    pub op_logger: Option<OpLogger>,

    /// Whether operation events are produced at all.
    pub op_logging: bool,

    /// Escalation policy.
    ///
    /// - `false`: failures in `mutate`/`reduce` are logged, the controller keeps the
    ///   last good state and continues (production default).
    /// - `true`: the failure is logged and then terminates the controller; it is
    ///   reported by [`Controller::closed`](crate::Controller::closed).
    pub escalate: bool,
}

impl Config {
    /// Sets the error sink.
    pub fn with_error_logger<F>(mut self, f: F) -> Self
    where
        F: Fn(&ControllerError) + Send + Sync + 'static,
    {
        self.error_logger = Some(Arc::new(f));
        self
    }

    /// Sets the operation-event sink and enables op logging.
    pub fn with_op_logger<F>(mut self, f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.op_logger = Some(Arc::new(f));
        self.op_logging = true;
        self
    }

    /// Enables or disables operation events.
    pub fn with_op_logging(mut self, enabled: bool) -> Self {
        self.op_logging = enabled;
        self
    }

    /// Enables or disables escalation.
    pub fn with_escalation(mut self, escalate: bool) -> Self {
        self.escalate = escalate;
        self
    }

    /// Installs this config as the process-wide default.
    ///
    /// Install-once: the second call returns [`ConfigError::AlreadyInstalled`] and
    /// leaves the first config in place. Controllers built **before** the install keep
    /// the config they snapshotted.
    pub fn install(self) -> Result<(), ConfigError> {
        GLOBAL.set(self).map_err(|_| ConfigError::AlreadyInstalled)
    }

    /// Returns the process-wide config, or `Config::default()` if none was installed.
    pub fn global() -> Config {
        GLOBAL.get().cloned().unwrap_or_default()
    }

    /// Sends an error to the configured sink.
    pub(crate) fn log_error(&self, err: &ControllerError) {
        match &self.error_logger {
            Some(f) => f(err),
            None => tracing::error!(label = err.as_label(), "{err}"),
        }
    }

    /// Sends an operation event to the configured sink (no-op when disabled).
    pub(crate) fn log_op(&self, ev: &Event) {
        if !self.op_logging {
            return;
        }
        match &self.op_logger {
            Some(f) => f(ev),
            None => LogWriter.write(ev),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("error_logger", &self.error_logger.as_ref().map(|_| ".."))
            .field("op_logger", &self.op_logger.as_ref().map(|_| ".."))
            .field("op_logging", &self.op_logging)
            .field("escalate", &self.escalate)
            .finish()
    }
}

/// When a controller activates its internal pipeline.
///
/// Consumed once on the `NotStarted → Running` transition; the transition is irreversible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControllerStart {
    /// Start on first `dispatch`, `current_state` or `state` call.
    #[default]
    Lazy,

    /// Start while building.
    Immediate,

    /// Start only through an explicit [`Controller::start`](crate::Controller::start).
    Manual,
}
