//! Subscriber registry for one event class.
//!
//! The lock is only held to append, remove or copy the list. Delivery always
//! happens on a snapshot, outside the lock.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::MonitorError;
use crate::event::EventClassKind;

use super::signal::CompletionReason;
use super::stats::MonitorCounters;
use super::subscription::Subscription;

struct Inner<N> {
    subscriptions: Vec<Arc<Subscription<N>>>,
    closed: bool,
}

/// The active subscriptions of one event class.
pub struct SubscriberRegistry<N> {
    class: EventClassKind,
    inner: Mutex<Inner<N>>,
    counters: Arc<MonitorCounters>,
}

impl<N> fmt::Debug for SubscriberRegistry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("class", &self.class)
            .field("len", &self.len())
            .finish()
    }
}

impl<N> SubscriberRegistry<N> {
    pub(crate) fn new(class: EventClassKind, counters: Arc<MonitorCounters>) -> Self {
        Self {
            class,
            inner: Mutex::new(Inner {
                subscriptions: Vec::new(),
                closed: false,
            }),
            counters,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<N>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an active subscription.
    pub(crate) fn register(&self, sub: Arc<Subscription<N>>) -> Result<(), MonitorError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(MonitorError::ShutDown { class: self.class });
        }
        // A subscription that already left the registry never comes back.
        if !sub.is_active() {
            return Err(MonitorError::Disconnected {
                path: "subscription".to_string(),
            });
        }
        inner.subscriptions.push(sub);
        Ok(())
    }

    /// Copy of the current list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Subscription<N>>> {
        self.lock().subscriptions.clone()
    }

    /// Completes `sub` for `reason`: removes it and pushes its signal.
    ///
    /// Idempotent across every completion path; returns true only for the
    /// call that actually completed it.
    pub(crate) fn complete(&self, sub: &Subscription<N>, reason: CompletionReason) -> bool {
        if !sub.begin_completion(reason) {
            return false;
        }
        {
            let mut inner = self.lock();
            inner.subscriptions.retain(|s| s.id() != sub.id());
        }
        self.counters.completed(reason);
        // Signal last, so the serving call never wakes up to find itself still listed.
        sub.signal_completion(reason);
        true
    }

    /// Refuses further registrations and returns whoever is still listed.
    pub(crate) fn close(&self) -> Vec<Arc<Subscription<N>>> {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscriptions.clone()
    }

    pub(crate) fn record_delivered(&self) {
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of listed subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Whether no subscription is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the owning monitor has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::monitor::subscription::SubscriptionState;

    fn registry() -> SubscriberRegistry<u32> {
        SubscriberRegistry::new(EventClassKind::Link, Arc::new(MonitorCounters::default()))
    }

    fn subscription() -> Arc<Subscription<u32>> {
        let (sub, _channels) = Subscription::new(EventClassKind::Link, 8);
        Arc::new(sub)
    }

    #[test]
    fn register_then_snapshot() {
        let reg = registry();
        let a = subscription();
        let b = subscription();
        reg.register(Arc::clone(&a)).unwrap();
        reg.register(Arc::clone(&b)).unwrap();

        let ids: Vec<_> = reg.snapshot().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
    }

    #[test]
    fn complete_removes_and_signals_exactly_once() {
        let reg = registry();
        let a = subscription();
        reg.register(Arc::clone(&a)).unwrap();

        assert!(reg.complete(&a, CompletionReason::DeliveryFailed));
        assert!(!reg.complete(&a, CompletionReason::Cancelled));
        assert!(reg.is_empty());
        assert_eq!(reg.counters.delivery_failed.load(Ordering::Relaxed), 1);
        assert_eq!(reg.counters.cancelled.load(Ordering::Relaxed), 0);

        assert_eq!(a.signal.wait().unwrap(), CompletionReason::DeliveryFailed);
        let err = a.signal.wait_timeout(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, MonitorError::Timeout { .. }));
    }

    #[test]
    fn completed_subscription_cannot_be_registered_again() {
        let reg = registry();
        let a = subscription();
        reg.register(Arc::clone(&a)).unwrap();
        reg.complete(&a, CompletionReason::Cancelled);
        assert_eq!(a.state(), SubscriptionState::Completing);

        assert!(reg.register(Arc::clone(&a)).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn closed_registry_rejects_registration() {
        let reg = registry();
        let a = subscription();
        reg.register(Arc::clone(&a)).unwrap();

        let remaining = reg.close();
        assert_eq!(remaining.len(), 1);
        assert!(reg.is_closed());

        let err = reg.register(subscription()).unwrap_err();
        assert!(matches!(err, MonitorError::ShutDown { class: EventClassKind::Link }));
    }
}
