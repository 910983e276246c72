//! Subscriber sinks.
//!
//! A sink is one client's output channel. Each subscription drives its sink
//! from a dedicated writer thread, so a sink may block without holding up the
//! dispatch loop or any other subscriber.

use std::io::Write;
use std::sync::Arc;

use crossbeam_channel::Sender;
use serde::Serialize;

use crate::error::SinkError;

/// Attempts delivery of one notification to one subscriber.
///
/// An `Err` ends the subscription; the sink is never called again.
pub trait Sink<N>: Send + 'static {
    /// Delivers `notification`, blocking if the transport applies backpressure.
    ///
    /// Completion is only observed between calls. A `send` already blocked
    /// keeps the writer thread and the sink until it returns; implementations
    /// that can stall should bound the wait themselves.
    fn send(&mut self, notification: &Arc<N>) -> Result<(), SinkError>;
}

impl<N, F> Sink<N> for F
where
    F: FnMut(&Arc<N>) -> Result<(), SinkError> + Send + 'static,
{
    fn send(&mut self, notification: &Arc<N>) -> Result<(), SinkError> {
        self(notification)
    }
}

/// Forwards notifications into a crossbeam channel.
///
/// Fails once the receiving side is dropped. A bounded channel blocks the
/// writer while full.
#[derive(Debug)]
pub struct ChannelSink<N> {
    tx: Sender<Arc<N>>,
}

impl<N> ChannelSink<N> {
    /// Wraps a crossbeam sender.
    #[must_use]
    pub const fn new(tx: Sender<Arc<N>>) -> Self {
        Self { tx }
    }
}

impl<N: Send + Sync + 'static> Sink<N> for ChannelSink<N> {
    fn send(&mut self, notification: &Arc<N>) -> Result<(), SinkError> {
        self.tx.send(Arc::clone(notification)).map_err(|_| SinkError::Closed)
    }
}

/// Writes each notification as one line of JSON.
#[derive(Debug)]
pub struct JsonLineSink<W> {
    writer: W,
    buf: Vec<u8>,
}

impl<W: Write> JsonLineSink<W> {
    /// Writes lines to `writer`.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer, buf: Vec::new() }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<N, W> Sink<N> for JsonLineSink<W>
where
    N: Serialize + Send + Sync + 'static,
    W: Write + Send + 'static,
{
    fn send(&mut self, notification: &Arc<N>) -> Result<(), SinkError> {
        self.buf.clear();
        serde_json::to_writer(&mut self.buf, notification.as_ref())?;
        self.buf.push(b'\n');
        // One write per line so sinks sharing a writer do not interleave.
        self.writer.write_all(&self.buf)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Forwards notifications into a tokio mpsc channel, the shape an async
/// streaming RPC handler reads from.
///
/// Uses `blocking_send`, which is fine because sinks run on plain writer
/// threads, never inside the runtime.
#[cfg(feature = "tokio-sink")]
#[derive(Debug)]
pub struct MpscSink<N> {
    tx: tokio::sync::mpsc::Sender<Arc<N>>,
}

#[cfg(feature = "tokio-sink")]
impl<N> MpscSink<N> {
    /// Wraps a tokio mpsc sender.
    #[must_use]
    pub const fn new(tx: tokio::sync::mpsc::Sender<Arc<N>>) -> Self {
        Self { tx }
    }
}

#[cfg(feature = "tokio-sink")]
impl<N: Send + Sync + 'static> Sink<N> for MpscSink<N> {
    fn send(&mut self, notification: &Arc<N>) -> Result<(), SinkError> {
        self.tx
            .blocking_send(Arc::clone(notification))
            .map_err(|_| SinkError::Closed)
    }
}
