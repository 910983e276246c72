//! Event class monitor and its dispatch loop.
//!
//! One monitor per event class. It owns the ingest queue the driver callback
//! feeds, a dedicated dispatch thread, and the subscriber registry. Each
//! event is turned into one shared notification and offered to every
//! subscriber's own bounded delivery queue with `try_send`, so the dispatch
//! thread never waits on a subscriber.

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::config::MonitorConfig;
use crate::driver::SwitchDriver;
use crate::error::{BridgeResult, MonitorError};
use crate::event::EventClassKind;

use super::adapter::EventClass;
use super::queue::{IngestProducer, IngestQueue};
use super::registry::SubscriberRegistry;
use super::signal::CompletionReason;
use super::sink::Sink;
use super::stats::{MonitorCounters, MonitorStats};
use super::subscription::{run_writer, Offer, Subscription, SubscriptionHandle};

#[derive(Debug, Default)]
struct ArmState {
    units: BTreeSet<i32>,
    shut_down: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Monitor for one event class.
///
/// Created by [`MonitorHub`](super::hub::MonitorHub) on the first subscribe
/// for its class. Runs until [`shutdown`](Self::shutdown) or drop.
pub struct EventClassMonitor<C: EventClass> {
    cfg: MonitorConfig,
    driver: Arc<dyn SwitchDriver>,
    queue: Arc<IngestQueue<C::Event>>,
    registry: Arc<SubscriberRegistry<C::Notification>>,
    counters: Arc<MonitorCounters>,
    armed: Mutex<ArmState>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    join: Mutex<Option<JoinHandle<()>>>,
    _class: PhantomData<C>,
}

impl<C: EventClass> std::fmt::Debug for EventClassMonitor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClassMonitor")
            .field("class", &C::KIND)
            .field("cfg", &self.cfg)
            .field("subscribers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl<C: EventClass> EventClassMonitor<C> {
    /// Creates the monitor and starts its dispatch thread.
    ///
    /// The driver callback is not registered until the first [`arm`](Self::arm).
    pub fn new(cfg: MonitorConfig, driver: Arc<dyn SwitchDriver>) -> Result<Self, MonitorError> {
        let counters = Arc::new(MonitorCounters::default());
        let queue = Arc::new(IngestQueue::new());
        let registry = Arc::new(SubscriberRegistry::new(C::KIND, Arc::clone(&counters)));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let thread_queue = Arc::clone(&queue);
        let thread_registry = Arc::clone(&registry);
        let thread_counters = Arc::clone(&counters);
        let join = thread::Builder::new()
            .name(format!("{}-{}-dispatch", cfg.thread_name_prefix, C::KIND))
            .spawn(move || dispatch_loop::<C>(&thread_queue, &thread_registry, &thread_counters, &shutdown_rx))
            .map_err(|e| MonitorError::Spawn { message: e.to_string() })?;

        tracing::info!(class = %C::KIND, units = ?cfg.units, "Event class monitor started");

        Ok(Self {
            cfg,
            driver,
            queue,
            registry,
            counters,
            armed: Mutex::new(ArmState::default()),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            join: Mutex::new(Some(join)),
            _class: PhantomData,
        })
    }

    /// Registers the driver callback on every configured unit not yet armed.
    ///
    /// Idempotent: a unit the driver accepted is never registered again. A
    /// unit whose registration failed stays un-armed and is retried by the
    /// next call; the failure is returned only to the call that attempted it.
    pub fn arm(&self) -> BridgeResult<()> {
        let mut armed = lock(&self.armed);
        if armed.shut_down {
            return Err(MonitorError::ShutDown { class: C::KIND }.into());
        }
        for &unit in &self.cfg.units {
            if armed.units.contains(&unit) {
                continue;
            }
            if let Err(err) = C::register(self.driver.as_ref(), unit, self.queue.producer()) {
                tracing::warn!(class = %C::KIND, unit, error = %err, "Driver callback registration failed");
                return Err(err.into());
            }
            armed.units.insert(unit);
            tracing::info!(class = %C::KIND, unit, "Driver callback registered");
        }
        Ok(())
    }

    /// Whether every configured unit is armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        let armed = lock(&self.armed);
        self.cfg.units.iter().all(|u| armed.units.contains(u))
    }

    /// Arms the class and registers a subscription delivering to `sink`.
    ///
    /// The subscriber sees every event dispatched after this returns, in
    /// dispatch order, until its sink fails, it falls behind, the handle is
    /// cancelled or dropped, or the monitor shuts down.
    pub fn subscribe<S>(&self, sink: S) -> BridgeResult<SubscriptionHandle<C::Notification>>
    where
        S: Sink<C::Notification>,
    {
        self.arm()?;

        let (sub, channels) = Subscription::new(C::KIND, self.cfg.subscriber_queue_capacity);
        let sub = Arc::new(sub);

        let writer_sub = Arc::clone(&sub);
        let writer_registry = Arc::clone(&self.registry);
        thread::Builder::new()
            .name(format!("{}-{}-writer", self.cfg.thread_name_prefix, C::KIND))
            .spawn(move || run_writer(&writer_sub, &channels, sink, &writer_registry))
            .map_err(|e| MonitorError::Spawn { message: e.to_string() })?;

        if let Err(err) = self.registry.register(Arc::clone(&sub)) {
            // Lost a race with shutdown; stop the writer we just started.
            sub.begin_completion(CompletionReason::MonitorShutdown);
            return Err(err.into());
        }

        tracing::debug!(
            class = %C::KIND,
            subscription = %sub.id(),
            subscribers = self.registry.len(),
            "Subscriber registered"
        );
        Ok(SubscriptionHandle::new(sub, Arc::clone(&self.registry)))
    }

    /// Serving-call form of [`subscribe`](Self::subscribe): blocks until the
    /// subscription completes and returns why.
    pub fn serve<S>(&self, sink: S) -> BridgeResult<CompletionReason>
    where
        S: Sink<C::Notification>,
    {
        let handle = self.subscribe(sink)?;
        Ok(handle.wait()?)
    }

    /// Push handle onto this class's ingest queue, bypassing the driver.
    #[must_use]
    pub fn publisher(&self) -> IngestProducer<C::Event> {
        self.queue.producer()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscribers(&self) -> usize {
        self.registry.len()
    }

    /// The event class this monitor serves.
    #[must_use]
    pub const fn class(&self) -> EventClassKind {
        C::KIND
    }

    /// Settings this monitor was created with.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.cfg
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> MonitorStats {
        let armed_units = lock(&self.armed).units.len();
        MonitorStats::collect(
            C::KIND,
            &self.counters,
            self.queue.pushed(),
            self.queue.discarded(),
            self.registry.len(),
            self.queue.len(),
            armed_units,
        )
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        lock(&self.armed).shut_down
    }

    /// Stops the monitor. Idempotent.
    ///
    /// Unregisters the driver callback on every armed unit, stops and joins
    /// the dispatch thread, then completes every remaining subscription with
    /// [`CompletionReason::MonitorShutdown`]. Events still queued, and any
    /// pushed afterwards, are discarded.
    pub fn shutdown(&self) {
        let units = {
            let mut armed = lock(&self.armed);
            if armed.shut_down {
                return;
            }
            armed.shut_down = true;
            std::mem::take(&mut armed.units)
        };

        for unit in units {
            if let Err(err) = C::unregister(self.driver.as_ref(), unit) {
                self.counters.unregister_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(class = %C::KIND, unit, error = %err, "Driver callback unregistration failed");
            }
        }

        // Disconnecting the shutdown channel wakes the dispatch loop.
        drop(lock(&self.shutdown_tx).take());
        if let Some(handle) = lock(&self.join).take() {
            if handle.join().is_err() {
                tracing::warn!(class = %C::KIND, "Dispatch thread panicked");
            }
        }

        // Also covers a driver that kept its handler after a failed unregister.
        let discarded = self.queue.close();

        let remaining = self.registry.close();
        let released = remaining
            .iter()
            .filter(|sub| self.registry.complete(sub, CompletionReason::MonitorShutdown))
            .count();

        tracing::info!(class = %C::KIND, discarded, released, "Event class monitor shut down");
    }
}

impl<C: EventClass> Drop for EventClassMonitor<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch_loop<C: EventClass>(
    queue: &IngestQueue<C::Event>,
    registry: &SubscriberRegistry<C::Notification>,
    counters: &MonitorCounters,
    shutdown_rx: &Receiver<()>,
) {
    let mut sequence: u64 = 0;
    loop {
        select! {
            recv(queue.receiver()) -> msg => {
                let Ok(event) = msg else { break };
                sequence += 1;
                dispatch_one::<C>(sequence, &event, registry, counters);
            }
            recv(shutdown_rx) -> _ => break,
        }
    }
    tracing::debug!(class = %C::KIND, dispatched = sequence, "Dispatch loop exited");
}

fn dispatch_one<C: EventClass>(
    sequence: u64,
    event: &C::Event,
    registry: &SubscriberRegistry<C::Notification>,
    counters: &MonitorCounters,
) {
    let notification = Arc::new(C::notification(sequence, event));
    counters.dispatched.fetch_add(1, Ordering::Relaxed);

    // Snapshot, then deliver without holding the registry lock.
    let subscribers = registry.snapshot();
    for sub in &subscribers {
        match sub.offer(Arc::clone(&notification)) {
            Offer::Accepted | Offer::Inactive => {}
            Offer::Full => {
                if registry.complete(sub, CompletionReason::Lagged) {
                    tracing::warn!(
                        class = %C::KIND,
                        subscription = %sub.id(),
                        sequence,
                        "Subscriber fell behind, dropping it"
                    );
                }
            }
        }
    }

    tracing::trace!(class = %C::KIND, sequence, subscribers = subscribers.len(), "Dispatched event");
}
