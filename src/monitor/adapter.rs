//! Event source adapters.
//!
//! One [`EventClass`] per kind of hardware notification. The handler each
//! class installs does exactly two things: clone the borrowed payload into an
//! owned event and push it onto the ingest queue.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::driver::{L2AddrHandler, LinkscanHandler, SwitchDriver};
use crate::error::DriverError;
use crate::event::{EventClassKind, L2Address, L2Event, L2Operation, LinkEvent, PortInfo};
use crate::notification::{L2Notification, LinkNotification};

use super::queue::IngestProducer;

/// Binds an event class to its driver registration and notification shape.
pub trait EventClass: Send + Sync + 'static {
    /// Owned event queued by the adapter.
    type Event: Send + 'static;
    /// Projection streamed to subscribers.
    type Notification: Serialize + fmt::Debug + Send + Sync + 'static;

    /// Class tag.
    const KIND: EventClassKind;

    /// Installs the copy-and-push handler for `unit`.
    fn register(driver: &dyn SwitchDriver, unit: i32, ingest: IngestProducer<Self::Event>) -> Result<(), DriverError>;

    /// Removes the handler for `unit`.
    fn unregister(driver: &dyn SwitchDriver, unit: i32) -> Result<(), DriverError>;

    /// Builds the notification for the `sequence`-th dispatched event.
    fn notification(sequence: u64, event: &Self::Event) -> Self::Notification;
}

/// Link state changes (linkscan).
#[derive(Debug, Clone, Copy)]
pub struct Link;

/// L2 address table changes.
#[derive(Debug, Clone, Copy)]
pub struct L2;

/// The linkscan handler pushing owned [`LinkEvent`]s.
#[must_use]
pub fn link_handler(ingest: IngestProducer<LinkEvent>) -> LinkscanHandler {
    Arc::new(move |unit: i32, port: i32, info: &PortInfo| {
        ingest.push(LinkEvent {
            unit,
            port,
            port_info: info.clone(),
        });
    })
}

/// The L2 handler pushing owned [`L2Event`]s.
#[must_use]
pub fn l2_handler(ingest: IngestProducer<L2Event>) -> L2AddrHandler {
    Arc::new(move |unit: i32, address: &L2Address, operation: i32| {
        ingest.push(L2Event {
            unit,
            address: address.clone(),
            operation: L2Operation::from_code(operation),
        });
    })
}

impl EventClass for Link {
    type Event = LinkEvent;
    type Notification = LinkNotification;

    const KIND: EventClassKind = EventClassKind::Link;

    fn register(driver: &dyn SwitchDriver, unit: i32, ingest: IngestProducer<LinkEvent>) -> Result<(), DriverError> {
        driver.linkscan_register(unit, link_handler(ingest))
    }

    fn unregister(driver: &dyn SwitchDriver, unit: i32) -> Result<(), DriverError> {
        driver.linkscan_unregister(unit)
    }

    fn notification(sequence: u64, event: &LinkEvent) -> LinkNotification {
        LinkNotification::from_event(sequence, event)
    }
}

impl EventClass for L2 {
    type Event = L2Event;
    type Notification = L2Notification;

    const KIND: EventClassKind = EventClassKind::L2;

    fn register(driver: &dyn SwitchDriver, unit: i32, ingest: IngestProducer<L2Event>) -> Result<(), DriverError> {
        driver.l2_addr_register(unit, l2_handler(ingest))
    }

    fn unregister(driver: &dyn SwitchDriver, unit: i32) -> Result<(), DriverError> {
        driver.l2_addr_unregister(unit)
    }

    fn notification(sequence: u64, event: &L2Event) -> L2Notification {
        L2Notification::from_event(sequence, event)
    }
}
