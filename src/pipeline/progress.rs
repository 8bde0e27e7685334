//! Progress delivery.
//!
//! Sinks are fire-and-forget: the pipeline never waits on a consumer and
//! never fails because a consumer went away.

use crate::models::ProgressEvent;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Receives one event per pipeline transition.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// Forwards events into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    /// A sink and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, event: ProgressEvent) {
        if let Err(err) = self.tx.send(event) {
            debug!("Progress receiver closed, dropping {} event", err.0.status);
        }
    }
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn on_progress(&self, event: ProgressEvent) {
        info!("[{}] {}: {}", event.analysis_id, event.status, event.message);
    }
}
