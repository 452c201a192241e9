//! Recording pipeline coordinator
//!
//! Orchestrates capture sources around one recorder and manages the recording
//! lifecycle: prepare, source start, source stop, finalize.

use super::source::{CaptureSource, SampleSender};
use super::{PipelineError, PipelineResult, RecordingConfig};
use crate::muxer::ContainerBackend;
use crate::recorder::{EventSender, MovieRecorder, RecorderEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// How long to wait for the muxer to open before giving up
const PREPARE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for container finalization
const FINISH_TIMEOUT: Duration = Duration::from_secs(30);

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Recording started
    Started,
    /// Recording stopped and finalized
    Stopped,
    /// Error occurred
    Error(String),
}

/// Wall-clock bookkeeping for one recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// When the recording started accepting samples
    pub started_at: DateTime<Utc>,

    /// When the recording was finalized
    pub ended_at: Option<DateTime<Utc>>,

    /// Session duration in milliseconds
    pub duration_ms: f64,
}

impl SessionInfo {
    fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0.0,
        }
    }

    fn end(&mut self) {
        let now = Utc::now();
        self.duration_ms = (now - self.started_at).num_milliseconds() as f64;
        self.ended_at = Some(now);
    }
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOutput {
    /// Path of the finalized container file
    pub destination: PathBuf,

    /// Session timing
    pub session: SessionInfo,

    /// Samples dropped due to muxer backpressure
    pub dropped_samples: u64,
}

/// Manages capture sources and the recorder for one recording at a time
pub struct CapturePipeline {
    /// Capture sources feeding the recorder
    sources: Vec<Box<dyn CaptureSource>>,

    /// Active recorder, present while a recording is underway
    recorder: Option<Arc<MovieRecorder>>,

    /// Receiver for the active recorder's delegate events
    recorder_events: Option<broadcast::Receiver<RecorderEvent>>,

    /// Current session bookkeeping
    session: Option<SessionInfo>,

    /// Event broadcaster
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl CapturePipeline {
    /// Create a pipeline with no sources
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            sources: Vec::new(),
            recorder: None,
            recorder_events: None,
            session: None,
            event_tx,
        }
    }

    /// Add a capture source
    pub fn add_source(&mut self, source: Box<dyn CaptureSource>) {
        tracing::info!("Adding capture source: {}", source.id());
        self.sources.push(source);
    }

    /// Remove all capture sources
    pub fn clear_sources(&mut self) {
        self.sources.clear();
    }

    /// Whether a recording is currently underway
    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }

    /// Start a recording session
    ///
    /// Builds the recorder over `backend`, registers the configured tracks,
    /// waits for preparation to complete, then starts every capture source.
    pub async fn start(
        &mut self,
        config: RecordingConfig,
        backend: Box<dyn ContainerBackend>,
    ) -> PipelineResult<()> {
        if self.recorder.is_some() {
            return Err(PipelineError::AlreadyRecording);
        }
        if config.video_format.is_none() && config.audio_format.is_none() {
            return Err(PipelineError::NoTracksConfigured);
        }

        tracing::info!("Starting recording to: {}", config.destination.display());

        let (delegate_tx, mut delegate_rx) = broadcast::channel(16);
        let recorder = Arc::new(MovieRecorder::new(
            config.destination.clone(),
            backend,
            Arc::new(EventSender::new(delegate_tx)),
        ));

        if let Some(format) = config.video_format {
            recorder.add_video_track(format, config.video_settings)?;
        }
        if let Some(format) = config.audio_format {
            recorder.add_audio_track(format, config.audio_settings)?;
        }

        recorder.prepare_to_record()?;
        match wait_for_event(&mut delegate_rx, PREPARE_TIMEOUT, "preparation").await? {
            RecorderEvent::PreparingFinished => {}
            RecorderEvent::Failed { message } => {
                let _ = self.event_tx.send(PipelineEvent::Error(message.clone()));
                return Err(PipelineError::RecordingFailed(message));
            }
            RecorderEvent::Finished => unreachable!("finished before any finish request"),
        }

        // Sources only start once the recorder accepts samples, so nothing is
        // appended while preparing.
        let sink = SampleSender::new(recorder.clone());
        let mut started = 0;
        let mut start_error = None;
        for source in &mut self.sources {
            match source.start(sink.clone()).await {
                Ok(()) => started += 1,
                Err(e) => {
                    start_error = Some(PipelineError::Source(format!("{}: {}", source.id(), e)));
                    break;
                }
            }
        }
        if let Some(error) = start_error {
            // Unwind: stop every source that already started, then finalize
            // the container so the writing thread exits instead of idling
            // behind an unreachable recorder.
            for source in self.sources.iter_mut().take(started) {
                if let Err(e) = source.stop().await {
                    tracing::error!("Failed to stop source {}: {}", source.id(), e);
                }
            }
            if let Err(e) = recorder.finish_recording() {
                tracing::error!("Failed to finalize after source start error: {}", e);
            } else if let Err(e) =
                wait_for_event(&mut delegate_rx, FINISH_TIMEOUT, "finalization").await
            {
                tracing::error!("Finalization after source start error: {}", e);
            }
            let _ = self.event_tx.send(PipelineEvent::Error(error.to_string()));
            return Err(error);
        }

        self.recorder = Some(recorder);
        self.recorder_events = Some(delegate_rx);
        self.session = Some(SessionInfo::begin());
        let _ = self.event_tx.send(PipelineEvent::Started);

        tracing::info!("Recording started");
        Ok(())
    }

    /// Stop the recording session and finalize the container
    ///
    /// Stops all sources first, then requests the finish exactly once and
    /// waits for the recorder's terminal event.
    pub async fn stop(&mut self) -> PipelineResult<RecordingOutput> {
        let recorder = self.recorder.take().ok_or(PipelineError::NotRecording)?;
        let mut delegate_rx = self
            .recorder_events
            .take()
            .ok_or(PipelineError::NotRecording)?;

        tracing::info!("Stopping recording");

        // Stop capture first so only in-flight samples race the finish; those
        // are dropped by the recorder by design.
        for source in &mut self.sources {
            if let Err(e) = source.stop().await {
                tracing::error!("Failed to stop source {}: {}", source.id(), e);
            }
        }

        recorder.finish_recording()?;

        let result = match wait_for_event(&mut delegate_rx, FINISH_TIMEOUT, "finalization").await? {
            RecorderEvent::Finished => {
                let mut session = self.session.take().unwrap_or_else(SessionInfo::begin);
                session.end();
                tracing::info!("Recording stopped. Duration: {}ms", session.duration_ms);
                Ok(RecordingOutput {
                    destination: recorder.destination().clone(),
                    session,
                    dropped_samples: recorder.dropped_sample_count(),
                })
            }
            RecorderEvent::Failed { message } => {
                self.session = None;
                let _ = self.event_tx.send(PipelineEvent::Error(message.clone()));
                Err(PipelineError::RecordingFailed(message))
            }
            RecorderEvent::PreparingFinished => {
                unreachable!("preparation event consumed during start")
            }
        };

        let _ = self.event_tx.send(PipelineEvent::Stopped);
        result
    }
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for the next recorder delegate event, bounded by `timeout`
async fn wait_for_event(
    rx: &mut broadcast::Receiver<RecorderEvent>,
    timeout: Duration,
    phase: &'static str,
) -> PipelineResult<RecorderEvent> {
    match tokio::time::timeout(timeout, rx.recv()).await {
        Ok(Ok(event)) => Ok(event),
        Ok(Err(_)) => Err(PipelineError::RecordingFailed(
            "recorder event channel closed".into(),
        )),
        Err(_) => Err(PipelineError::Timeout(phase)),
    }
}
