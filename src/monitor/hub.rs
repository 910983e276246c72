//! Owner of the per-class monitors.
//!
//! Hand one `Arc<MonitorHub>` to every RPC handler. Each class monitor is
//! created on the first subscribe for that class and lives until
//! [`MonitorHub::shutdown`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{BridgeConfig, MonitorConfig};
use crate::driver::SwitchDriver;
use crate::error::{BridgeResult, MonitorError};
use crate::notification::{L2Notification, LinkNotification};

use super::adapter::{EventClass, Link, L2};
use super::dispatcher::EventClassMonitor;
use super::signal::CompletionReason;
use super::sink::Sink;
use super::stats::MonitorStats;
use super::subscription::SubscriptionHandle;

type Slot<C> = Mutex<Option<Arc<EventClassMonitor<C>>>>;

/// Lazily created monitors for every event class, sharing one driver.
pub struct MonitorHub {
    driver: Arc<dyn SwitchDriver>,
    config: BridgeConfig,
    link: Slot<Link>,
    l2: Slot<L2>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for MonitorHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHub")
            .field("config", &self.config)
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MonitorHub {
    /// A hub with no monitors started yet.
    #[must_use]
    pub fn new(driver: Arc<dyn SwitchDriver>, config: BridgeConfig) -> Self {
        Self {
            driver,
            config,
            link: Mutex::new(None),
            l2: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// The configuration shared by both monitors.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The link monitor, created on first use.
    pub fn link(&self) -> BridgeResult<Arc<EventClassMonitor<Link>>> {
        self.get_or_create(&self.link, &self.config.link)
    }

    /// The L2 monitor, created on first use.
    pub fn l2(&self) -> BridgeResult<Arc<EventClassMonitor<L2>>> {
        self.get_or_create(&self.l2, &self.config.l2)
    }

    /// Subscribes `sink` to link events.
    pub fn subscribe_link<S>(&self, sink: S) -> BridgeResult<SubscriptionHandle<LinkNotification>>
    where
        S: Sink<LinkNotification>,
    {
        self.link()?.subscribe(sink)
    }

    /// Subscribes `sink` to L2 events.
    pub fn subscribe_l2<S>(&self, sink: S) -> BridgeResult<SubscriptionHandle<L2Notification>>
    where
        S: Sink<L2Notification>,
    {
        self.l2()?.subscribe(sink)
    }

    /// Blocks streaming link events into `sink` until the subscription ends.
    pub fn serve_link<S>(&self, sink: S) -> BridgeResult<CompletionReason>
    where
        S: Sink<LinkNotification>,
    {
        self.link()?.serve(sink)
    }

    /// Blocks streaming L2 events into `sink` until the subscription ends.
    pub fn serve_l2<S>(&self, sink: S) -> BridgeResult<CompletionReason>
    where
        S: Sink<L2Notification>,
    {
        self.l2()?.serve(sink)
    }

    /// Stats for every monitor created so far.
    #[must_use]
    pub fn stats(&self) -> Vec<MonitorStats> {
        let mut out = Vec::with_capacity(2);
        if let Some(m) = peek(&self.link) {
            out.push(m.stats());
        }
        if let Some(m) = peek(&self.l2) {
            out.push(m.stats());
        }
        out
    }

    /// Shuts down every monitor created so far and refuses to create more.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(m) = peek(&self.link) {
            m.shutdown();
        }
        if let Some(m) = peek(&self.l2) {
            m.shutdown();
        }
        tracing::info!("Monitor hub shut down");
    }

    fn get_or_create<C: EventClass>(
        &self,
        slot: &Slot<C>,
        cfg: &MonitorConfig,
    ) -> BridgeResult<Arc<EventClassMonitor<C>>> {
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        // Checked under the slot lock so shutdown cannot miss a new monitor.
        if self.shut_down.load(Ordering::Acquire) {
            return Err(MonitorError::ShutDown { class: C::KIND }.into());
        }
        if let Some(m) = guard.as_ref() {
            return Ok(Arc::clone(m));
        }
        let monitor = Arc::new(EventClassMonitor::<C>::new(cfg.clone(), Arc::clone(&self.driver))?);
        *guard = Some(Arc::clone(&monitor));
        Ok(monitor)
    }
}

impl Drop for MonitorHub {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn peek<C: EventClass>(slot: &Slot<C>) -> Option<Arc<EventClassMonitor<C>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SimulatedDriver;
    use crate::error::SinkError;
    use crate::event::EventClassKind;

    fn hub() -> (Arc<SimulatedDriver>, MonitorHub) {
        let driver = Arc::new(SimulatedDriver::new());
        let hub = MonitorHub::new(Arc::clone(&driver) as Arc<dyn SwitchDriver>, BridgeConfig::default());
        (driver, hub)
    }

    #[test]
    fn monitors_are_created_lazily_and_shared() {
        let (driver, hub) = hub();
        assert!(hub.stats().is_empty());

        let a = hub.link().unwrap();
        let b = hub.link().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(hub.stats().len(), 1);
        // Creating a monitor does not arm it.
        assert_eq!(driver.register_calls(EventClassKind::Link, 0), 0);
        assert_eq!(driver.register_calls(EventClassKind::L2, 0), 0);
    }

    #[test]
    fn shutdown_stops_created_monitors_and_blocks_new_ones() {
        let (driver, hub) = hub();
        let handle = hub
            .subscribe_l2(|_: &Arc<L2Notification>| -> Result<(), SinkError> { Ok(()) })
            .unwrap();

        hub.shutdown();

        assert_eq!(handle.wait().unwrap(), CompletionReason::MonitorShutdown);
        assert_eq!(driver.unregister_calls(EventClassKind::L2, 0), 1);
        assert!(hub.link().unwrap_err().is_shut_down());
        assert!(hub.l2().unwrap_err().is_shut_down());
    }
}
