use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::event::EventClassKind;

use super::signal::CompletionReason;

#[derive(Debug, Default)]
pub(crate) struct MonitorCounters {
    pub(crate) dispatched: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) delivery_failed: AtomicU64,
    pub(crate) lagged: AtomicU64,
    pub(crate) cancelled: AtomicU64,
    pub(crate) shut_down: AtomicU64,
    pub(crate) unregister_failures: AtomicU64,
}

impl MonitorCounters {
    pub(crate) fn completed(&self, reason: CompletionReason) {
        let counter = match reason {
            CompletionReason::DeliveryFailed => &self.delivery_failed,
            CompletionReason::Lagged => &self.lagged,
            CompletionReason::Cancelled => &self.cancelled,
            CompletionReason::MonitorShutdown => &self.shut_down,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time counters for one event class monitor.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub class: EventClassKind,
    /// Events pushed by driver callbacks.
    pub ingested: u64,
    pub dispatched: u64,
    /// Notifications accepted by sinks.
    pub delivered: u64,
    pub delivery_failed: u64,
    pub lagged: u64,
    pub cancelled: u64,
    pub shut_down: u64,
    pub unregister_failures: u64,
    /// Events dropped by shutdown: still queued then, or pushed after.
    pub discarded: u64,
    pub active_subscribers: usize,
    pub queue_depth: usize,
    pub armed_units: usize,
}

impl MonitorStats {
    pub(crate) fn collect(
        class: EventClassKind,
        counters: &MonitorCounters,
        ingested: u64,
        discarded: u64,
        active_subscribers: usize,
        queue_depth: usize,
        armed_units: usize,
    ) -> Self {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Self {
            class,
            ingested,
            dispatched: load(&counters.dispatched),
            delivered: load(&counters.delivered),
            delivery_failed: load(&counters.delivery_failed),
            lagged: load(&counters.lagged),
            cancelled: load(&counters.cancelled),
            shut_down: load(&counters.shut_down),
            unregister_failures: load(&counters.unregister_failures),
            discarded,
            active_subscribers,
            queue_depth,
            armed_units,
        }
    }

    /// Subscriptions completed for any reason.
    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.delivery_failed + self.lagged + self.cancelled + self.shut_down
    }
}
