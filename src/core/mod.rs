//! Controller core: state machine, driver and mutation context.
//!
//! The only public API from this module is [`Controller`] (with its
//! [`ControllerBuilder`]), [`MutationContext`] and [`Status`].
//!
//! Internal modules:
//! - [`inner`]: state shared by handles, driver and contexts; start/teardown;
//! - [`driver`]: the single task that spawns `mutate` calls and serializes `reduce`;
//! - [`context`]: per-action handle passed to `Machine::mutate`;
//! - [`status`]: lifecycle status cell;
//! - [`builder`]: controller construction.

mod builder;
mod context;
mod controller;
mod driver;
mod inner;
mod status;

pub use builder::ControllerBuilder;
pub use context::MutationContext;
pub use controller::Controller;
pub use status::Status;
