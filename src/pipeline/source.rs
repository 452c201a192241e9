//! Capture source trait
//!
//! Each source represents one externally scheduled capture stream (a camera
//! video callback, an audio tap). Sources are handed a [`SampleSender`] on
//! start and deliver samples from their own thread, never holding a lock the
//! recorder might need and never blocking on an append.

use super::PipelineResult;
use crate::media::{MediaKind, MediaTime, Sample};
use crate::recorder::MovieRecorder;
use async_trait::async_trait;
use std::sync::Arc;

/// Clone-able handle capture sources use to deliver samples
///
/// Every call is fire-and-forget: samples appended after the recording has
/// begun finishing are silently dropped, which is the expected tail of
/// in-flight buffers racing a stop.
#[derive(Clone)]
pub struct SampleSender {
    recorder: Arc<MovieRecorder>,
}

impl SampleSender {
    pub(crate) fn new(recorder: Arc<MovieRecorder>) -> Self {
        Self { recorder }
    }

    /// Deliver one video frame
    pub fn send_video(&self, payload: Arc<[u8]>, pts: MediaTime) {
        self.recorder.append_video_sample(payload, pts);
    }

    /// Deliver one audio chunk
    pub fn send_audio(&self, payload: Arc<[u8]>, pts: MediaTime) {
        self.recorder.append_audio_sample(Sample::audio(pts, payload));
    }
}

/// Trait for capture sources feeding the pipeline
///
/// Sources are managed by the [`CapturePipeline`](super::CapturePipeline):
/// started once the recorder is accepting samples, stopped before the
/// recording is finalized.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Source identifier (e.g. "camera-video", "microphone")
    fn id(&self) -> &str;

    /// Kind of media this source produces
    fn kind(&self) -> MediaKind;

    /// Begin delivering samples through `sink`
    async fn start(&mut self, sink: SampleSender) -> PipelineResult<()>;

    /// Stop delivering and release capture resources
    ///
    /// After this resolves the source must not call the sink again; a few
    /// in-flight samples racing the stop are tolerated by the recorder.
    async fn stop(&mut self) -> PipelineResult<()>;
}
