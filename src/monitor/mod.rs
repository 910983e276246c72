//! Event fan-out from driver callbacks to streaming subscribers.
//!
//! Per event class: driver callback -> [`IngestQueue`] -> dispatch thread ->
//! one bounded delivery queue per subscriber -> writer thread -> [`Sink`].
//! The driver callback never blocks on a subscriber, and a slow or failed
//! subscriber never holds up the others.

/// Event class definitions and driver callback adapters.
pub mod adapter;
/// Per-class monitor and dispatch worker.
pub mod dispatcher;
/// Owner of the per-class monitors.
pub mod hub;
/// Unbounded multi-producer ingest queue.
pub mod queue;
/// Live subscriber set.
pub mod registry;
/// One-shot completion signal.
pub mod signal;
/// Subscriber output sinks.
pub mod sink;
/// Monitor counters.
pub mod stats;
/// Subscriptions and their handles.
pub mod subscription;

pub use adapter::{l2_handler, link_handler, EventClass, Link, L2};
pub use dispatcher::EventClassMonitor;
pub use hub::MonitorHub;
pub use queue::{IngestProducer, IngestQueue};
pub use registry::SubscriberRegistry;
pub use signal::CompletionReason;
#[cfg(feature = "tokio-sink")]
pub use sink::MpscSink;
pub use sink::{ChannelSink, JsonLineSink, Sink};
pub use stats::MonitorStats;
pub use subscription::{Subscription, SubscriptionHandle, SubscriptionId, SubscriptionState};
