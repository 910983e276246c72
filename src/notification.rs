//! Wire-stable notifications streamed to subscribers.
//!
//! A notification is built once per dispatched event and shared read-only by
//! every subscriber that receives it. Field names and enum spellings are part
//! of the serialized shape, so keep them stable.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{Duplex, L2Event, L2Operation, LinkEvent, LinkStatus, MacAddress};

/// A link state change as seen by subscribers.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkNotification {
    /// Per-class dispatch order, starting at 1.
    pub sequence: u64,
    pub unit: i32,
    pub port: i32,
    pub link: LinkStatus,
    pub speed_mbps: u32,
    pub duplex: Duplex,
    pub enabled: bool,
    pub observed_at: DateTime<Utc>,
}

impl LinkNotification {
    /// Projects a queued link event, stamping it with the current time.
    #[must_use]
    pub fn from_event(sequence: u64, event: &LinkEvent) -> Self {
        Self {
            sequence,
            unit: event.unit,
            port: event.port,
            link: event.port_info.link_status,
            speed_mbps: event.port_info.speed_mbps,
            duplex: event.port_info.duplex,
            enabled: event.port_info.enabled,
            observed_at: Utc::now(),
        }
    }
}

/// An L2 table change as seen by subscribers.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2Notification {
    /// Per-class dispatch order, starting at 1.
    pub sequence: u64,
    pub unit: i32,
    pub mac: MacAddress,
    pub vid: u16,
    pub port: i32,
    pub module_id: i32,
    pub trunk_id: i32,
    pub flags: u32,
    pub operation: L2Operation,
    pub observed_at: DateTime<Utc>,
}

impl L2Notification {
    /// Projects a queued L2 event, stamping it with the current time.
    #[must_use]
    pub fn from_event(sequence: u64, event: &L2Event) -> Self {
        let addr = &event.address;
        Self {
            sequence,
            unit: event.unit,
            mac: addr.mac,
            vid: addr.vid,
            port: addr.port,
            module_id: addr.module_id,
            trunk_id: addr.trunk_id,
            flags: addr.flags,
            operation: event.operation,
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{L2Address, PortInfo};

    #[test]
    fn link_notification_projects_port_info() {
        let event = LinkEvent {
            unit: 0,
            port: 7,
            port_info: PortInfo::with_link(LinkStatus::Up, 25_000),
        };
        let n = LinkNotification::from_event(3, &event);
        assert_eq!(n.sequence, 3);
        assert_eq!(n.port, 7);
        assert_eq!(n.link, LinkStatus::Up);
        assert_eq!(n.speed_mbps, 25_000);
    }

    #[test]
    fn l2_notification_serializes_snake_case() {
        let event = L2Event {
            unit: 1,
            address: L2Address::new(MacAddress::new([2, 0, 0, 0, 0, 9]), 100, 4),
            operation: L2Operation::LearnEvent,
        };
        let n = L2Notification::from_event(1, &event);
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["mac"], "02:00:00:00:00:09");
        assert_eq!(v["vid"], 100);
        assert_eq!(v["operation"], "learn_event");
        assert!(v.get("observed_at").is_some());
    }
}
