//! # nslbridge - Switch ASIC event monitoring
//!
//! nslbridge turns hardware event callbacks from a switch driver (link state
//! changes, L2 address table changes) into ordered notification streams for
//! any number of long-lived subscribers.
//!
//! ## Core Concepts
//!
//! - **Event class**: a category of driver events with its own queue, dispatch
//!   thread and subscribers (`Link`, `L2`)
//! - **Ingest queue**: where driver callbacks drop owned copies of events
//! - **Dispatch loop**: turns each event into one shared notification and
//!   offers it to every subscriber
//! - **Subscription**: one client stream, completed exactly once with a
//!   [`CompletionReason`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nslbridge::{BridgeConfig, JsonLineSink, MonitorHub, SimulatedDriver};
//!
//! let driver = Arc::new(SimulatedDriver::new());
//! let hub = MonitorHub::new(driver.clone(), BridgeConfig::default());
//!
//! // Blocks until the client goes away or the hub shuts down.
//! let reason = hub.serve_link(JsonLineSink::new(std::io::stdout()))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// JSON configuration.
pub mod config;
/// Switch driver collaborator and its simulation.
pub mod driver;
/// Error types.
pub mod error;
/// Hardware event payloads.
pub mod event;
/// Process logging setup.
pub mod logging;
/// Event fan-out to subscribers.
pub mod monitor;
/// Notifications streamed to subscribers.
pub mod notification;

pub use config::{BridgeConfig, MonitorConfig};
pub use driver::{L2AddrHandler, LinkscanHandler, SimulatedDriver, SwitchDriver};
pub use error::{BridgeError, BridgeResult, ConfigError, DriverError, MonitorError, SinkError};
pub use event::{
	Duplex, EventClassKind, L2Address, L2Event, L2Operation, LinkEvent, LinkStatus, LinkscanMode, MacAddress,
	PortInfo,
};
#[cfg(feature = "tokio-sink")]
pub use monitor::MpscSink;
pub use monitor::{
	ChannelSink, CompletionReason, EventClassMonitor, JsonLineSink, MonitorHub, MonitorStats, Sink, SubscriptionHandle,
	SubscriptionId, SubscriptionState,
};
pub use notification::{L2Notification, LinkNotification};
