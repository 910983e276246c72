//! Subscriptions and the serving-call handle.
//!
//! Lifecycle: `Active` (registered, receiving) -> `Completing` (removed,
//! signal pushed) -> `Done` (serving call consumed the signal). There is no
//! way back to `Active`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use serde::Serialize;
use uuid::Uuid;

use crate::error::MonitorError;
use crate::event::EventClassKind;

use super::registry::SubscriberRegistry;
use super::signal::{CompletionReason, CompletionSignal};
use super::sink::Sink;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SubscriptionState {
    Active = 0,
    Completing = 1,
    Done = 2,
}

impl SubscriptionState {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Active,
            1 => Self::Completing,
            _ => Self::Done,
        }
    }
}

/// Outcome of offering a notification to a subscriber's delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    Accepted,
    /// Delivery queue is full: the subscriber is not keeping up.
    Full,
    /// Already completing; nothing more is delivered.
    Inactive,
}

/// Per-client state shared by the registry, the writer and the serving call.
pub struct Subscription<N> {
    id: SubscriptionId,
    class: EventClassKind,
    state: AtomicU8,
    outbox: Sender<Arc<N>>,
    // Dropped on completion; the writer treats the disconnect as "stop".
    halt: Mutex<Option<Sender<()>>>,
    reason: OnceLock<CompletionReason>,
    pub(crate) signal: CompletionSignal,
}

impl<N> fmt::Debug for Subscription<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

pub(crate) struct WriterChannels<N> {
    pub(crate) outbox: Receiver<Arc<N>>,
    pub(crate) halt: Receiver<()>,
}

impl<N> Subscription<N> {
    pub(crate) fn new(class: EventClassKind, capacity: usize) -> (Self, WriterChannels<N>) {
        let (outbox_tx, outbox_rx) = bounded(capacity.max(1));
        let (halt_tx, halt_rx) = bounded(0);
        let sub = Self {
            id: SubscriptionId::new(),
            class,
            state: AtomicU8::new(SubscriptionState::Active as u8),
            outbox: outbox_tx,
            halt: Mutex::new(Some(halt_tx)),
            reason: OnceLock::new(),
            signal: CompletionSignal::new(),
        };
        let channels = WriterChannels {
            outbox: outbox_rx,
            halt: halt_rx,
        };
        (sub, channels)
    }

    /// Unique id of this subscription.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Event class subscribed to.
    #[must_use]
    pub const fn class(&self) -> EventClassKind {
        self.class
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether notifications are still accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Set once the subscription has started completing.
    #[must_use]
    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.reason.get().copied()
    }

    /// Non-blocking hand-off to the writer.
    pub(crate) fn offer(&self, notification: Arc<N>) -> Offer {
        if !self.is_active() {
            return Offer::Inactive;
        }
        match self.outbox.try_send(notification) {
            Ok(()) => Offer::Accepted,
            Err(TrySendError::Full(_)) => Offer::Full,
            Err(TrySendError::Disconnected(_)) => Offer::Inactive,
        }
    }

    /// Active -> Completing. Only one caller ever gets `true`.
    pub(crate) fn begin_completion(&self, reason: CompletionReason) -> bool {
        let won = self
            .state
            .compare_exchange(
                SubscriptionState::Active as u8,
                SubscriptionState::Completing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            let _ = self.reason.set(reason);
            drop(self.halt.lock().unwrap_or_else(PoisonError::into_inner).take());
        }
        won
    }

    pub(crate) fn signal_completion(&self, reason: CompletionReason) {
        self.signal.push(reason);
    }

    fn mark_done(&self) {
        self.state.store(SubscriptionState::Done as u8, Ordering::Release);
    }
}

/// Drains one subscription's delivery queue into its sink until the
/// subscription completes or the sink fails.
pub(crate) fn run_writer<N, S>(
    sub: &Arc<Subscription<N>>,
    channels: &WriterChannels<N>,
    mut sink: S,
    registry: &SubscriberRegistry<N>,
) where
    N: Send + Sync + 'static,
    S: Sink<N>,
{
    loop {
        select! {
            recv(channels.halt) -> _ => break,
            recv(channels.outbox) -> msg => {
                let Ok(notification) = msg else { break };
                if !sub.is_active() {
                    break;
                }
                if let Err(err) = sink.send(&notification) {
                    if registry.complete(sub, CompletionReason::DeliveryFailed) {
                        tracing::warn!(
                            class = %sub.class,
                            subscription = %sub.id,
                            error = %err,
                            "Delivery failed, dropping subscriber"
                        );
                    }
                    break;
                }
                registry.record_delivered();
            }
        }
    }
    tracing::trace!(class = %sub.class, subscription = %sub.id, "Writer stopped");
}

/// The serving call's side of a subscription.
///
/// Dropping the handle cancels the subscription if it is still active, which
/// is how a client hang-up reaches the monitor.
#[derive(Debug)]
pub struct SubscriptionHandle<N> {
    subscription: Arc<Subscription<N>>,
    registry: Arc<SubscriberRegistry<N>>,
}

impl<N> SubscriptionHandle<N> {
    pub(crate) fn new(subscription: Arc<Subscription<N>>, registry: Arc<SubscriberRegistry<N>>) -> Self {
        Self { subscription, registry }
    }

    /// The subscription id backing this handle.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Event class subscribed to.
    #[must_use]
    pub fn class(&self) -> EventClassKind {
        self.subscription.class()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.subscription.state()
    }

    /// Blocks until the subscription completes and returns why.
    pub fn wait(&self) -> Result<CompletionReason, MonitorError> {
        if let Some(reason) = self.consumed() {
            return Ok(reason);
        }
        let reason = self.subscription.signal.wait()?;
        self.finish(reason);
        Ok(reason)
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<CompletionReason, MonitorError> {
        if let Some(reason) = self.consumed() {
            return Ok(reason);
        }
        let reason = self.subscription.signal.wait_timeout(timeout)?;
        self.finish(reason);
        Ok(reason)
    }

    /// Ends the subscription from the serving side (client hang-up).
    ///
    /// Returns false if it had already completed for another reason.
    ///
    /// Takes effect at once for the monitor and any waiter, but does not
    /// interrupt a [`Sink::send`](super::sink::Sink::send) in progress; the
    /// writer stops after that call returns.
    pub fn cancel(&self) -> bool {
        self.registry.complete(&self.subscription, CompletionReason::Cancelled)
    }

    fn consumed(&self) -> Option<CompletionReason> {
        if self.subscription.state() == SubscriptionState::Done {
            self.subscription.completion_reason()
        } else {
            None
        }
    }

    fn finish(&self, reason: CompletionReason) {
        self.subscription.mark_done();
        tracing::debug!(
            class = %self.subscription.class,
            subscription = %self.subscription.id,
            reason = %reason,
            "Serving call finished"
        );
    }
}

impl<N> Drop for SubscriptionHandle<N> {
    fn drop(&mut self) {
        if self.subscription.is_active() {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_accepts_until_the_queue_is_full() {
        let (sub, _channels) = Subscription::<u32>::new(EventClassKind::Link, 2);
        assert_eq!(sub.offer(Arc::new(1)), Offer::Accepted);
        assert_eq!(sub.offer(Arc::new(2)), Offer::Accepted);
        assert_eq!(sub.offer(Arc::new(3)), Offer::Full);
    }

    #[test]
    fn begin_completion_wins_once_and_stops_offers() {
        let (sub, channels) = Subscription::<u32>::new(EventClassKind::L2, 4);
        assert!(sub.begin_completion(CompletionReason::Lagged));
        assert!(!sub.begin_completion(CompletionReason::Cancelled));

        assert_eq!(sub.state(), SubscriptionState::Completing);
        assert_eq!(sub.completion_reason(), Some(CompletionReason::Lagged));
        assert_eq!(sub.offer(Arc::new(1)), Offer::Inactive);
        // The writer's halt channel is now disconnected.
        assert!(channels.halt.recv().is_err());
    }

    #[test]
    fn subscription_ids_are_unique() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }
}
