//! Switch driver collaborator.
//!
//! The driver owns the hardware and invokes registered handlers on its own
//! threads. Handlers receive payloads by shared borrow; nothing borrowed may
//! outlive the call, so anything queued must be copied first.

use std::sync::Arc;

use crate::error::DriverError;
use crate::event::{L2Address, PortInfo};

/// In-process driver used by tests, benches and the tap binary.
pub mod sim;

pub use sim::SimulatedDriver;

/// Linkscan handler: `(unit, port, port_info)`.
pub type LinkscanHandler = Arc<dyn Fn(i32, i32, &PortInfo) + Send + Sync>;

/// L2 address handler: `(unit, address, raw_operation_code)`.
pub type L2AddrHandler = Arc<dyn Fn(i32, &L2Address, i32) + Send + Sync>;

/// The driver operations the monitor consumes.
///
/// Handlers are expected to return promptly; the driver may call them
/// concurrently from any number of threads.
pub trait SwitchDriver: Send + Sync {
    /// Registers a linkscan handler for `unit`.
    fn linkscan_register(&self, unit: i32, handler: LinkscanHandler) -> Result<(), DriverError>;

    /// Removes the linkscan handler for `unit`.
    fn linkscan_unregister(&self, unit: i32) -> Result<(), DriverError>;

    /// Registers an L2 address table handler for `unit`.
    fn l2_addr_register(&self, unit: i32, handler: L2AddrHandler) -> Result<(), DriverError>;

    /// Removes the L2 address table handler for `unit`.
    fn l2_addr_unregister(&self, unit: i32) -> Result<(), DriverError>;
}
