//! Recorder delegate contract
//!
//! The recorder reports lifecycle events to a delegate supplied at
//! construction, never through return values: append calls are fire-and-forget
//! and preparation/finalization complete asynchronously. Exactly one terminal
//! callback (`on_finished` or `on_failed`) fires per recording session.

use super::status::RecorderStatus;
use crate::media::MediaKind;
use crate::muxer::MuxerError;
use serde::Serialize;
use thiserror::Error;

/// Errors reported by the recorder
#[derive(Error, Debug, Clone)]
pub enum RecorderError {
    /// Contract violation: an operation was called in a status that forbids it
    #[error("{operation} called while {status}")]
    InvalidState {
        operation: &'static str,
        status: RecorderStatus,
    },

    /// A track of this kind was already added
    #[error("{0} track already added")]
    DuplicateTrack(MediaKind),

    /// Failure reported by the muxer port
    #[error(transparent)]
    Muxer(#[from] MuxerError),
}

/// Result type for recorder operations
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Receives recorder lifecycle notifications
///
/// Callbacks are invoked from the recorder's internal threads; implementations
/// decide their own delivery context (forward to a channel, post to a runtime)
/// and must not block, since the writing thread is a real-time path.
pub trait RecorderDelegate: Send + Sync {
    /// Preparation succeeded; the recorder is now accepting samples
    fn on_preparing_finished(&self);

    /// The session aborted; the recorder must be discarded
    fn on_failed(&self, error: &RecorderError);

    /// The container was finalized successfully
    fn on_finished(&self);
}

/// Recorder lifecycle events, the channel-friendly form of the delegate calls
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RecorderEvent {
    /// Corresponds to `on_preparing_finished`
    PreparingFinished,
    /// Corresponds to `on_failed`
    Failed { message: String },
    /// Corresponds to `on_finished`
    Finished,
}

/// Delegate adapter that fans events out over a broadcast channel
///
/// Lets callers consume recorder events on whatever context they subscribe
/// from, matching the pipeline's event delivery.
pub struct EventSender {
    tx: tokio::sync::broadcast::Sender<RecorderEvent>,
}

impl EventSender {
    /// Wrap a broadcast sender
    pub fn new(tx: tokio::sync::broadcast::Sender<RecorderEvent>) -> Self {
        Self { tx }
    }
}

impl RecorderDelegate for EventSender {
    fn on_preparing_finished(&self) {
        let _ = self.tx.send(RecorderEvent::PreparingFinished);
    }

    fn on_failed(&self, error: &RecorderError) {
        let _ = self.tx.send(RecorderEvent::Failed {
            message: error.to_string(),
        });
    }

    fn on_finished(&self) {
        let _ = self.tx.send(RecorderEvent::Finished);
    }
}
