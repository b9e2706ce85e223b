//! # Observer handle.
//!
//! A [`Subscription`] is the receiving end of one observer registered on a
//! [`BroadcastChannel`](super::BroadcastChannel). It can be consumed with
//! [`Subscription::recv`] (tokio style) or as a [`futures::Stream`].
//!
//! Dropping the handle unsubscribes it; other observers and the producer are unaffected.

use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::broadcast::{Envelope, Shared};
use crate::error::RecvError;

/// Receiving end of one observer.
///
/// ### Stream semantics
/// - yields every value emitted after the subscription was created, in order;
/// - ends when the channel closes (after draining queued values);
/// - ends immediately when the subscription was refused (see [`Subscription::failure`]).
pub struct Subscription<T> {
    id: u64,
    rx: Option<mpsc::UnboundedReceiver<Envelope<T>>>,
    pending: Option<T>,
    failure: Option<RecvError>,
    channel: Weak<Shared<T>>,
}

// No field is structurally pinned.
impl<T> Unpin for Subscription<T> {}

impl<T> Subscription<T> {
    pub(super) fn new(id: u64, rx: mpsc::UnboundedReceiver<Envelope<T>>, channel: Weak<Shared<T>>) -> Self {
        Self {
            id,
            rx: Some(rx),
            pending: None,
            failure: None,
            channel,
        }
    }

    /// A subscription on a closed channel: yields nothing, reports no failure.
    pub(super) fn ended() -> Self {
        Self {
            id: u64::MAX,
            rx: None,
            pending: None,
            failure: None,
            channel: Weak::new(),
        }
    }

    /// A subscription the channel refused to register.
    pub(super) fn refused(err: RecvError) -> Self {
        Self {
            id: u64::MAX,
            rx: None,
            pending: None,
            failure: Some(err),
            channel: Weak::new(),
        }
    }

    /// Queues `value` to be yielded before anything received from the channel.
    pub(crate) fn with_initial(mut self, value: T) -> Self {
        if self.rx.is_some() {
            self.pending = Some(value);
        }
        self
    }

    /// Receives the next value.
    ///
    /// ### Errors
    /// - [`RecvError::Occupied`] if this subscription was refused by an exclusive channel;
    /// - [`RecvError::Closed`] once the channel is closed and the queue is drained.
    pub async fn recv(&mut self) -> Result<T, RecvError> {
        if let Some(v) = self.pending.take() {
            return Ok(v);
        }
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await.map(|env| env.value).ok_or(RecvError::Closed),
            None => Err(self.failure.unwrap_or(RecvError::Closed)),
        }
    }

    /// Returns why the channel refused this subscription, if it did.
    pub fn failure(&self) -> Option<RecvError> {
        self.failure
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if let Some(v) = this.pending.take() {
            return Poll::Ready(Some(v));
        }
        match this.rx.as_mut() {
            Some(rx) => rx.poll_recv(cx).map(|next| next.map(|env| env.value)),
            None => Poll::Ready(None),
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if self.rx.is_none() {
            return;
        }
        if let Some(shared) = self.channel.upgrade() {
            shared.registry.lock().remove(self.id);
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.rx.is_some())
            .field("failure", &self.failure)
            .finish()
    }
}
