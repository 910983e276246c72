//! Error types for nslbridge.
//!
//! Every failure in the monitoring subsystem is strongly typed using thiserror,
//! so callers (RPC handlers in particular) can map specific conditions to
//! their own status codes.

use thiserror::Error;

use crate::event::EventClassKind;

/// Errors reported by the switch driver.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("{operation} failed on unit {unit} (driver code {code})")]
    Call {
        operation: &'static str,
        unit: i32,
        code: i32,
    },

    #[error("unit {unit} is not attached")]
    UnitNotAttached {
        unit: i32,
    },
}

impl DriverError {
    /// Creates an error for a driver call that returned a non-zero code.
    #[must_use]
    pub const fn call(operation: &'static str, unit: i32, code: i32) -> Self {
        Self::Call { operation, unit, code }
    }
}

/// Errors delivering a notification to one subscriber.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("subscriber stream is closed")]
    Closed,

    #[error("subscriber write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised by an event class monitor.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("{class} monitor has been shut down")]
    ShutDown {
        class: EventClassKind,
    },

    #[error("failed to spawn thread: {message}")]
    Spawn {
        message: String,
    },
}

/// Errors loading or validating configuration.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config field '{field}': {reason}")]
    Invalid {
        field: String,
        reason: String,
    },
}

/// Malformed MAC address text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid MAC address '{input}'")]
pub struct MacParseError {
    /// The rejected text.
    pub input: String,
}

/// Top-level error type for nslbridge.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl BridgeError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the driver rejected a call.
    #[must_use]
    pub const fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }

    /// Returns true if this is a monitor error.
    #[must_use]
    pub const fn is_monitor(&self) -> bool {
        matches!(self, Self::Monitor(_))
    }

    /// Returns true if the monitor this call targeted is gone for good.
    #[must_use]
    pub const fn is_shut_down(&self) -> bool {
        matches!(self, Self::Monitor(MonitorError::ShutDown { .. }))
    }

    /// Returns true if this error is retryable.
    ///
    /// A failed arming leaves the unit un-armed, so the next subscribe
    /// attempts the registration again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Driver(_) => true,
            Self::Monitor(e) => matches!(e, MonitorError::Timeout { .. }),
            Self::Config(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for nslbridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_message_carries_code() {
        let err = DriverError::call("linkscan_register", 0, -4);
        let msg = format!("{err}");
        assert!(msg.contains("linkscan_register"));
        assert!(msg.contains("-4"));
    }

    #[test]
    fn test_monitor_error_shut_down() {
        let err = MonitorError::ShutDown {
            class: EventClassKind::L2,
        };
        assert_eq!(err.to_string(), "l2 monitor has been shut down");
    }

    #[test]
    fn test_bridge_error_from_driver() {
        let err: BridgeError = DriverError::UnitNotAttached { unit: 3 }.into();
        assert!(err.is_driver());
        assert!(err.is_retryable());
        assert!(!err.is_shut_down());
    }

    #[test]
    fn test_bridge_error_shut_down_is_final() {
        let err: BridgeError = MonitorError::ShutDown {
            class: EventClassKind::Link,
        }
        .into();
        assert!(err.is_monitor());
        assert!(err.is_shut_down());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_bridge_error_internal() {
        let err = BridgeError::internal("unexpected state");
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("unexpected state"));
    }

    #[test]
    fn test_sink_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: SinkError = io.into();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
