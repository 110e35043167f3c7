//! Fire-and-forget progress reporting for copy loops.
//!
//! Sinks may fail (closed channel, full buffer, dropped transport). Callers log
//! the failure and keep going; a broken sink never aborts the work it observes.

use std::fmt;

use tokio::sync::mpsc;

/// One step of a multi-file operation. `done` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub done: usize,
    pub total: usize,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(done: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            done,
            total,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError(pub String);

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "progress not delivered: {}", self.0)
    }
}

impl std::error::Error for SinkError {}

pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate) -> Result<(), SinkError>;
}

/// Discards every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) -> Result<(), SinkError> + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) -> Result<(), SinkError> {
        self(update)
    }
}

/// Bounded channel sink: never blocks, drops updates when the consumer lags.
#[derive(Clone)]
pub struct ChannelSink(pub mpsc::Sender<ProgressUpdate>);

impl ChannelSink {
    /// Create a sink and the receiving end consumed by the caller.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self(tx), rx)
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, update: ProgressUpdate) -> Result<(), SinkError> {
        self.0.try_send(update).map_err(|e| SinkError(e.to_string()))
    }
}

/// Report through `sink`, logging instead of propagating delivery failures.
pub fn emit(sink: &dyn ProgressSink, update: ProgressUpdate) {
    if let Err(e) = sink.report(update) {
        tracing::debug!(error = %e, "progress update dropped");
    }
}
