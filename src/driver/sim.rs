use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::DriverError;
use crate::event::{EventClassKind, L2Address, L2Operation, PortInfo};

use super::{L2AddrHandler, LinkscanHandler, SwitchDriver};

/// Driver return code for "no such registration".
pub const E_NOT_FOUND: i32 = -7;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CallCounts {
    register: usize,
    unregister: usize,
}

#[derive(Default)]
struct SimState {
    linkscan: HashMap<i32, LinkscanHandler>,
    l2: HashMap<i32, L2AddrHandler>,
    calls: HashMap<(EventClassKind, i32), CallCounts>,
    fail_next: HashMap<EventClassKind, i32>,
}

/// A software switch driver.
///
/// Records every register/unregister call, can be told to reject the next
/// registration for a class, and delivers injected events by calling the
/// registered handler on the injecting thread.
#[derive(Default)]
pub struct SimulatedDriver {
    state: Mutex<SimState>,
}

impl SimulatedDriver {
    /// A driver with no handlers installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of register calls made for `class` on `unit`, failed ones included.
    #[must_use]
    pub fn register_calls(&self, class: EventClassKind, unit: i32) -> usize {
        self.counts(class, unit).register
    }

    /// Number of unregister calls made for `class` on `unit`.
    #[must_use]
    pub fn unregister_calls(&self, class: EventClassKind, unit: i32) -> usize {
        self.counts(class, unit).unregister
    }

    /// Whether a handler is currently installed for `class` on `unit`.
    #[must_use]
    pub fn is_registered(&self, class: EventClassKind, unit: i32) -> bool {
        let Ok(state) = self.state.lock() else {
            return false;
        };
        match class {
            EventClassKind::Link => state.linkscan.contains_key(&unit),
            EventClassKind::L2 => state.l2.contains_key(&unit),
        }
    }

    /// Makes the next registration for `class` fail with `code`.
    pub fn fail_next_registration(&self, class: EventClassKind, code: i32) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next.insert(class, code);
        }
    }

    /// Reports a link change. Returns false if no handler is installed.
    pub fn inject_link(&self, unit: i32, port: i32, info: &PortInfo) -> bool {
        let handler = match self.state.lock() {
            Ok(state) => state.linkscan.get(&unit).cloned(),
            Err(_) => None,
        };
        // Called without the state lock, like a driver thread would.
        match handler {
            Some(handler) => {
                handler(unit, port, info);
                true
            }
            None => false,
        }
    }

    /// Reports an L2 table change. Returns false if no handler is installed.
    pub fn inject_l2(&self, unit: i32, address: &L2Address, operation: L2Operation) -> bool {
        let handler = match self.state.lock() {
            Ok(state) => state.l2.get(&unit).cloned(),
            Err(_) => None,
        };
        match handler {
            Some(handler) => {
                handler(unit, address, operation.code());
                true
            }
            None => false,
        }
    }

    fn counts(&self, class: EventClassKind, unit: i32) -> CallCounts {
        self.state
            .lock()
            .map(|state| state.calls.get(&(class, unit)).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    fn record(
        &self,
        class: EventClassKind,
        unit: i32,
        op: &'static str,
        registering: bool,
    ) -> Result<MutexGuard<'_, SimState>, DriverError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DriverError::call(op, unit, E_NOT_FOUND))?;
        let counts = state.calls.entry((class, unit)).or_default();
        if registering {
            counts.register += 1;
            if let Some(code) = state.fail_next.remove(&class) {
                return Err(DriverError::call(op, unit, code));
            }
        } else {
            counts.unregister += 1;
        }
        Ok(state)
    }
}

impl SwitchDriver for SimulatedDriver {
    fn linkscan_register(&self, unit: i32, handler: LinkscanHandler) -> Result<(), DriverError> {
        let mut state = self.record(EventClassKind::Link, unit, "linkscan_register", true)?;
        state.linkscan.insert(unit, handler);
        Ok(())
    }

    fn linkscan_unregister(&self, unit: i32) -> Result<(), DriverError> {
        let mut state = self.record(EventClassKind::Link, unit, "linkscan_unregister", false)?;
        state
            .linkscan
            .remove(&unit)
            .map(|_| ())
            .ok_or(DriverError::call("linkscan_unregister", unit, E_NOT_FOUND))
    }

    fn l2_addr_register(&self, unit: i32, handler: L2AddrHandler) -> Result<(), DriverError> {
        let mut state = self.record(EventClassKind::L2, unit, "l2_addr_register", true)?;
        state.l2.insert(unit, handler);
        Ok(())
    }

    fn l2_addr_unregister(&self, unit: i32) -> Result<(), DriverError> {
        let mut state = self.record(EventClassKind::L2, unit, "l2_addr_unregister", false)?;
        state
            .l2
            .remove(&unit)
            .map(|_| ())
            .ok_or(DriverError::call("l2_addr_unregister", unit, E_NOT_FOUND))
    }
}
