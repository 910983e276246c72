//! Single-slot completion signal between the monitor and a serving call.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;

use crate::error::MonitorError;

/// Why a subscription stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The sink rejected a notification.
    DeliveryFailed,
    /// The subscriber's delivery queue overflowed.
    Lagged,
    /// The serving call cancelled (client hang-up).
    Cancelled,
    /// The event class monitor shut down.
    MonitorShutdown,
}

impl CompletionReason {
    /// Stable snake_case name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeliveryFailed => "delivery_failed",
            Self::Lagged => "lagged",
            Self::Cancelled => "cancelled",
            Self::MonitorShutdown => "monitor_shutdown",
        }
    }
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds at most one [`CompletionReason`]. Only the first push lands.
#[derive(Debug)]
pub(crate) struct CompletionSignal {
    tx: Sender<CompletionReason>,
    rx: Receiver<CompletionReason>,
}

impl CompletionSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Returns false if the slot was already filled.
    pub(crate) fn push(&self, reason: CompletionReason) -> bool {
        self.tx.try_send(reason).is_ok()
    }

    pub(crate) fn wait(&self) -> Result<CompletionReason, MonitorError> {
        self.rx.recv().map_err(|_| MonitorError::Disconnected {
            path: "completion_signal".to_string(),
        })
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> Result<CompletionReason, MonitorError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => MonitorError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => MonitorError::Disconnected {
                path: "completion_signal".to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_first_push_lands() {
        let signal = CompletionSignal::new();
        assert!(signal.push(CompletionReason::DeliveryFailed));
        assert!(!signal.push(CompletionReason::Cancelled));
        assert_eq!(signal.wait().unwrap(), CompletionReason::DeliveryFailed);
    }

    #[test]
    fn wait_timeout_reports_timeout_when_unsignalled() {
        let signal = CompletionSignal::new();
        let err = signal.wait_timeout(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, MonitorError::Timeout { .. }));
    }
}
