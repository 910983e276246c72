//! Hardware event payloads.
//!
//! The driver hands its callbacks borrowed views of these types that are only
//! valid for the duration of the call. Events queued for dispatch are always
//! owned copies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MacParseError;

/// Category of hardware notification. Each class has its own queue,
/// dispatch thread and registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClassKind {
    /// Port link state changes reported by linkscan.
    Link,
    /// L2 forwarding table changes.
    L2,
}

impl EventClassKind {
    /// Short lowercase name used in thread names and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::L2 => "l2",
        }
    }
}

impl fmt::Display for EventClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Down,
    Up,
    Failed,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Duplex {
    Half,
    Full,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkscanMode {
    None,
    Software,
    Hardware,
}

/// Port state as reported with a linkscan callback.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub enabled: bool,
    pub link_status: LinkStatus,
    pub speed_mbps: u32,
    pub duplex: Duplex,
    pub autoneg: bool,
    pub linkscan: LinkscanMode,
    pub loopback: bool,
    pub frame_max: u32,
}

impl PortInfo {
    /// A full-duplex, enabled port with the given link state and speed.
    #[must_use]
    pub const fn with_link(link_status: LinkStatus, speed_mbps: u32) -> Self {
        Self {
            enabled: true,
            link_status,
            speed_mbps,
            duplex: Duplex::Full,
            autoneg: true,
            linkscan: LinkscanMode::Software,
            loopback: false,
            frame_max: 9216,
        }
    }
}

/// A 48-bit Ethernet address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Wraps raw address octets.
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// The raw address octets.
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MacParseError { input: s.to_string() };

        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(err)?;
            if part.len() != 2 {
                return Err(err());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An L2 forwarding table entry.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Address {
    pub mac: MacAddress,
    pub vid: u16,
    pub port: i32,
    pub module_id: i32,
    pub trunk_id: i32,
    pub flags: u32,
}

impl L2Address {
    /// An entry for `mac` on `vid` learned on `port`.
    #[must_use]
    pub const fn new(mac: MacAddress, vid: u16, port: i32) -> Self {
        Self {
            mac,
            vid,
            port,
            module_id: 0,
            trunk_id: 0,
            flags: 0,
        }
    }
}

/// What happened to an L2 table entry.
///
/// Decoded from the driver's raw callback operation code. Codes this crate
/// does not know are preserved rather than rejected.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum L2Operation {
    Delete,
    Add,
    Report,
    LearnEvent,
    AgeEvent,
    MoveEvent,
    Unknown(i32),
}

impl L2Operation {
    /// Decodes a raw driver operation code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Delete,
            1 => Self::Add,
            2 => Self::Report,
            3 => Self::LearnEvent,
            4 => Self::AgeEvent,
            5 => Self::MoveEvent,
            other => Self::Unknown(other),
        }
    }

    /// The raw driver operation code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Delete => 0,
            Self::Add => 1,
            Self::Report => 2,
            Self::LearnEvent => 3,
            Self::AgeEvent => 4,
            Self::MoveEvent => 5,
            Self::Unknown(code) => code,
        }
    }
}

/// A link state change, owned by the monitor once queued.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub unit: i32,
    pub port: i32,
    pub port_info: PortInfo,
}

/// An L2 table change, owned by the monitor once queued.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2Event {
    pub unit: i32,
    pub address: L2Address,
    pub operation: L2Operation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_displays_lowercase_colon_hex() {
        let mac = MacAddress::new([0x00, 0x1b, 0x21, 0xAA, 0xbc, 0x0f]);
        assert_eq!(mac.to_string(), "00:1b:21:aa:bc:0f");
    }

    #[test]
    fn mac_address_parses_its_display_form() {
        let mac: MacAddress = "02:00:5e:10:00:01".parse().unwrap();
        assert_eq!(mac.octets(), [0x02, 0x00, 0x5e, 0x10, 0x00, 0x01]);
    }

    #[test]
    fn mac_address_rejects_malformed_input() {
        for bad in ["", "02:00:5e:10:00", "02:00:5e:10:00:01:ff", "2:00:5e:10:00:01", "zz:00:5e:10:00:01"] {
            let err = bad.parse::<MacAddress>().unwrap_err();
            assert_eq!(err.input, bad);
        }
    }

    #[test]
    fn mac_address_serializes_as_string() {
        let mac = MacAddress::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"de:ad:be:ef:00:01\"");
        let back: MacAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }

    #[test]
    fn l2_operation_preserves_unknown_codes() {
        assert_eq!(L2Operation::from_code(1), L2Operation::Add);
        assert_eq!(L2Operation::from_code(4), L2Operation::AgeEvent);
        assert_eq!(L2Operation::from_code(42), L2Operation::Unknown(42));
        assert_eq!(L2Operation::from_code(42).code(), 42);
        assert_eq!(L2Operation::MoveEvent.code(), 5);
    }
}
