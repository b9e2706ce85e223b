//! Multicast delivery of values to zero-or-many observers.
//!
//! ## Contents
//! - [`BroadcastChannel`] fan-out point with per-observer queues
//! - [`Subscription`] observer handle (`recv().await` or `futures::Stream`)
//! - [`Delivery`] shared vs. exclusive discipline
//!
//! ## Quick reference
//! - **Producers**: the controller reduction loop (states), the effect pump (effects).
//! - **Consumers**: whoever holds a [`Subscription`] from `Controller::state` /
//!   `Controller::effects`, or from the channel directly.

mod broadcast;
mod subscription;

pub use broadcast::{BroadcastChannel, Delivery};
pub(crate) use broadcast::Hold;
pub use subscription::Subscription;
