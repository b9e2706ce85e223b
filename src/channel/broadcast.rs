//! # Broadcast channel with per-observer queues.
//!
//! [`BroadcastChannel`] delivers every emitted value to every observer registered
//! at emission time. Each observer owns an unbounded FIFO queue, so a slow observer
//! never makes another one miss values and never blocks the producer.
//!
//! ## Architecture
//! ```text
//!    emit(value)
//!        │                       (clone per observer)
//!        ├────────────────► [queue O1] ─► Subscription 1
//!        ├────────────────► [queue O2] ─► Subscription 2
//!        └────────────────► [queue ON] ─► Subscription N
//! ```
//!
//! ## Rules
//! - **Non-blocking emit**: `emit()` never awaits; with no observers the value is dropped.
//! - **No replay**: an observer only sees values emitted after `subscribe()` returned.
//! - **Exclusive mode**: one live observer at a time; extra subscriptions fail with
//!   [`RecvError::Occupied`] and receive nothing.
//! - **Close is final**: after `close()` emits are no-ops and new subscriptions end immediately;
//!   existing observers drain what was already queued, then end.
//! - **Held values**: a value sent with [`deliver`](BroadcastChannel::deliver) carries a
//!   [`Hold`] that is released only once every observer copy has been received (or dropped).

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedSemaphorePermit, mpsc};

use super::Subscription;
use crate::error::RecvError;

/// Delivery discipline, fixed at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Delivery {
    /// Any number of observers, each receiving every value.
    #[default]
    Shared,

    /// At most one live observer.
    Exclusive,
}

/// Capacity permit shared by every queued copy of one value.
pub(crate) type Hold = Arc<OwnedSemaphorePermit>;

/// One queued copy of a value.
pub(super) struct Envelope<T> {
    pub(super) value: T,
    _hold: Option<Hold>,
}

/// Observer queue with its registration id.
pub(super) struct Observer<T> {
    pub(super) id: u64,
    tx: mpsc::UnboundedSender<Envelope<T>>,
}

/// Observer set guarded by a single lock.
pub(super) struct Registry<T> {
    pub(super) observers: Vec<Observer<T>>,
    next_id: u64,
    closed: bool,
}

pub(super) struct Shared<T> {
    delivery: Delivery,
    pub(super) registry: Mutex<Registry<T>>,
    observed: Notify,
}

/// Multicast channel over a value stream.
///
/// ### Properties
/// - **Cloneable**: clones share the same observer set.
/// - **Concurrent**: `emit`, `subscribe` and unsubscription (dropping a [`Subscription`])
///   may race freely; all go through one short critical section.
/// - **Ordered**: values from one producer reach each observer in emission order.
pub struct BroadcastChannel<T> {
    inner: Arc<Shared<T>>,
}

impl<T> Clone for BroadcastChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> BroadcastChannel<T> {
    /// Creates an open channel with the given delivery discipline.
    pub fn new(delivery: Delivery) -> Self {
        Self {
            inner: Arc::new(Shared {
                delivery,
                registry: Mutex::new(Registry {
                    observers: Vec::new(),
                    next_id: 0,
                    closed: false,
                }),
                observed: Notify::new(),
            }),
        }
    }

    /// Returns the delivery discipline.
    pub fn delivery(&self) -> Delivery {
        self.inner.delivery
    }

    /// Pushes `value` into the queue of every live observer.
    ///
    /// - Closed channel → no-op.
    /// - No observers → the value is dropped.
    /// - Observers whose handle is gone are pruned on the way.
    pub fn emit(&self, value: T) {
        self.fan_out(&value, None);
    }

    /// Pushes a copy of `value` to every live observer, each copy holding `hold`.
    ///
    /// Returns the number of observers that took it; `0` means the caller still owns
    /// the only copy (no observer, or closed channel).
    pub(crate) fn deliver(&self, value: &T, hold: &Hold) -> usize {
        self.fan_out(value, Some(hold))
    }

    fn fan_out(&self, value: &T, hold: Option<&Hold>) -> usize {
        let mut reg = self.inner.registry.lock();
        if reg.closed {
            return 0;
        }
        let mut delivered = 0;
        reg.observers.retain(|o| {
            let envelope = Envelope {
                value: value.clone(),
                _hold: hold.cloned(),
            };
            if o.tx.send(envelope).is_ok() {
                delivered += 1;
                true
            } else {
                tracing::trace!(observer = o.id, "pruned observer with closed queue");
                false
            }
        });
        delivered
    }

    /// Registers a new observer.
    ///
    /// The returned [`Subscription`] receives values emitted strictly after this call.
    /// On a closed channel it ends immediately with [`RecvError::Closed`]; on an occupied
    /// exclusive channel it fails with [`RecvError::Occupied`].
    pub fn subscribe(&self) -> Subscription<T> {
        let mut reg = self.inner.registry.lock();
        if reg.closed {
            return Subscription::ended();
        }
        if self.inner.delivery == Delivery::Exclusive {
            reg.observers.retain(|o| !o.tx.is_closed());
            if !reg.observers.is_empty() {
                return Subscription::refused(RecvError::Occupied);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = reg.next_id;
        reg.next_id += 1;
        reg.observers.push(Observer { id, tx });
        drop(reg);

        self.inner.observed.notify_waiters();
        Subscription::new(id, rx, Arc::downgrade(&self.inner))
    }

    /// Closes the channel permanently.
    ///
    /// Idempotent. Observers drain values already queued and then end.
    pub fn close(&self) {
        {
            let mut reg = self.inner.registry.lock();
            reg.closed = true;
            reg.observers.clear();
        }
        self.inner.observed.notify_waiters();
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.registry.lock().closed
    }

    /// Number of registered observers (handles dropped but not yet pruned excluded).
    pub fn observer_count(&self) -> usize {
        let reg = self.inner.registry.lock();
        reg.observers.iter().filter(|o| !o.tx.is_closed()).count()
    }

    /// Resolves once at least one observer is registered, or the channel is closed.
    pub async fn observed(&self) {
        loop {
            let notified = self.inner.observed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() || self.observer_count() > 0 {
                return;
            }
            notified.await;
        }
    }
}

impl<T> Registry<T> {
    /// Removes one observer by id (unsubscription).
    pub(super) fn remove(&mut self, id: u64) {
        self.observers.retain(|o| o.id != id);
    }
}
