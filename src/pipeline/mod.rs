//! Capture pipeline glue
//!
//! Connects externally scheduled capture sources to a [`MovieRecorder`]
//! (crate::recorder::MovieRecorder) and manages session start/stop around a
//! full recording. Sources deliver samples fire-and-forget from their own
//! threads; the pipeline never blocks a capture callback on the recorder.

pub mod coordinator;
pub mod source;

pub use coordinator::{CapturePipeline, PipelineEvent, RecordingOutput, SessionInfo};
pub use source::{CaptureSource, SampleSender};

use crate::recorder::RecorderError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while driving a recording session
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("No capture track configured")]
    NoTracksConfigured,

    #[error("Capture source error: {0}")]
    Source(String),

    #[error("Recording failed: {0}")]
    RecordingFailed(String),

    #[error("Timed out waiting for recorder: {0}")]
    Timeout(&'static str),

    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Configuration for starting a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Destination path for the output container
    pub destination: PathBuf,

    /// Video format negotiated by the capture side, if recording video
    pub video_format: Option<crate::media::FormatDescription>,

    /// Video encoder settings
    #[serde(default)]
    pub video_settings: Map<String, Value>,

    /// Audio format negotiated by the capture side, if recording audio
    pub audio_format: Option<crate::media::FormatDescription>,

    /// Audio encoder settings
    #[serde(default)]
    pub audio_settings: Map<String, Value>,
}

impl RecordingConfig {
    /// Config with a video track only
    pub fn video_only(destination: PathBuf, format: crate::media::FormatDescription) -> Self {
        Self {
            destination,
            video_format: Some(format),
            video_settings: Map::new(),
            audio_format: None,
            audio_settings: Map::new(),
        }
    }
}
