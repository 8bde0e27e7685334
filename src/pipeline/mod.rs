//! Pipeline orchestration.
//!
//! The orchestrator drives one analysis through
//! `resolving -> collecting_evidence -> analyzing -> completed`, with
//! `failed` reachable from any phase, and publishes every transition to a
//! [`ProgressSink`].

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{CancelHandle, Pipeline};
pub use progress::{ChannelSink, LogSink, ProgressSink};
