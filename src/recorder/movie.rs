//! Movie recorder
//!
//! Owns the recording lifecycle: status transitions, session-start
//! coordination, and draining of in-flight samples during shutdown.
//!
//! Samples arrive from independently scheduled capture threads (video and
//! audio never share one) plus an arbitrary control thread. The container
//! backend is single-threaded and non-reentrant, so everything that touches it
//! funnels through one dedicated writing thread fed by a FIFO channel. That
//! FIFO ordering, not a lock on the data path, is what excludes
//! append-after-finish races: the finish command is enqueued strictly after
//! every append that preceded it, and the writing thread stops consuming once
//! it has finalized the container.

use super::delegate::{RecorderDelegate, RecorderError, RecorderResult};
use super::status::RecorderStatus;
use crate::media::{FormatDescription, MediaKind, MediaTime, Sample, TrackDescriptor};
use crate::muxer::{AppendOutcome, ContainerBackend, MuxerError, MuxerPort};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Work items for the writing thread
enum WriteCommand {
    Append(Sample),
    Finish,
}

/// Resources consumed when preparation begins
struct PendingStart {
    backend: Box<dyn ContainerBackend>,
    receiver: Receiver<WriteCommand>,
}

/// Status plus track descriptors, updated together under one lock
///
/// Reads on the append hot path only snapshot the status; writes happen on
/// rare lifecycle transitions, so a reader-writer lock keeps the capture
/// callbacks off the writing queue entirely.
struct ControlState {
    status: RecorderStatus,
    video_track: Option<TrackDescriptor>,
    audio_track: Option<TrackDescriptor>,
}

struct Shared {
    control: RwLock<ControlState>,
    delegate: Arc<dyn RecorderDelegate>,
    dropped_samples: AtomicU64,
}

impl Shared {
    fn status(&self) -> RecorderStatus {
        self.control.read().status
    }

    /// Jump to `Failed` and fire the terminal callback, once
    fn fail(&self, error: RecorderError) {
        {
            let mut control = self.control.write();
            if control.status.is_terminal() {
                tracing::warn!("Ignoring failure after terminal status: {}", error);
                return;
            }
            control.status = RecorderStatus::Failed;
        }
        tracing::error!("Recording failed: {}", error);
        self.delegate.on_failed(&error);
    }
}

/// Records timestamped media samples into a container file
///
/// One instance records one session; after `Finished` or `Failed` the
/// recorder must be discarded and a new one constructed. There is no separate
/// cancellation: to abandon a recording, finish it and delete the output.
pub struct MovieRecorder {
    shared: Arc<Shared>,
    sender: Sender<WriteCommand>,
    pending: Mutex<Option<PendingStart>>,
    destination: PathBuf,
}

impl MovieRecorder {
    /// Create a recorder writing to `destination` through `backend`
    ///
    /// The delegate receives lifecycle callbacks from the recorder's internal
    /// threads; exactly one of `on_finished`/`on_failed` fires per session.
    pub fn new(
        destination: PathBuf,
        backend: Box<dyn ContainerBackend>,
        delegate: Arc<dyn RecorderDelegate>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            shared: Arc::new(Shared {
                control: RwLock::new(ControlState {
                    status: RecorderStatus::Idle,
                    video_track: None,
                    audio_track: None,
                }),
                delegate,
                dropped_samples: AtomicU64::new(0),
            }),
            sender,
            pending: Mutex::new(Some(PendingStart { backend, receiver })),
            destination,
        }
    }

    /// Current status snapshot; cheap to call from any thread
    pub fn status(&self) -> RecorderStatus {
        self.shared.status()
    }

    /// Number of samples dropped because the muxer signalled backpressure
    pub fn dropped_sample_count(&self) -> u64 {
        self.shared.dropped_samples.load(Ordering::Relaxed)
    }

    /// Destination path of the output container
    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }

    /// Add the video track; only valid while `Idle`, at most once
    pub fn add_video_track(
        &self,
        format: FormatDescription,
        encoder_settings: Map<String, Value>,
    ) -> RecorderResult<()> {
        self.add_track(TrackDescriptor::new(
            MediaKind::Video,
            format,
            encoder_settings,
        ))
    }

    /// Add the audio track; only valid while `Idle`, at most once
    pub fn add_audio_track(
        &self,
        format: FormatDescription,
        encoder_settings: Map<String, Value>,
    ) -> RecorderResult<()> {
        self.add_track(TrackDescriptor::new(
            MediaKind::Audio,
            format,
            encoder_settings,
        ))
    }

    fn add_track(&self, descriptor: TrackDescriptor) -> RecorderResult<()> {
        let mut control = self.shared.control.write();
        if control.status != RecorderStatus::Idle {
            return Err(RecorderError::InvalidState {
                operation: "add_track",
                status: control.status,
            });
        }
        let slot = match descriptor.kind {
            MediaKind::Video => &mut control.video_track,
            MediaKind::Audio => &mut control.audio_track,
        };
        if slot.is_some() {
            return Err(RecorderError::DuplicateTrack(descriptor.kind));
        }
        tracing::debug!("Track added: {}", descriptor.kind);
        *slot = Some(descriptor);
        Ok(())
    }

    /// Begin preparation: open the muxer, register tracks, start writing
    ///
    /// The status moves to `PreparingToRecord` before this returns, so a
    /// concurrent second call cannot race past the precondition check. The
    /// muxer work itself runs on the writing thread; success is reported via
    /// `on_preparing_finished`, failure via `on_failed`.
    pub fn prepare_to_record(&self) -> RecorderResult<()> {
        let tracks: Vec<TrackDescriptor> = {
            let mut control = self.shared.control.write();
            if control.status != RecorderStatus::Idle {
                return Err(RecorderError::InvalidState {
                    operation: "prepare_to_record",
                    status: control.status,
                });
            }
            control.status = RecorderStatus::PreparingToRecord;
            control
                .video_track
                .iter()
                .chain(control.audio_track.iter())
                .cloned()
                .collect()
        };

        tracing::info!("Preparing to record: {}", self.destination.display());

        // Present exactly when the Idle -> PreparingToRecord transition above
        // was won, which this thread just did.
        let pending = self
            .pending
            .lock()
            .take()
            .expect("idle -> preparing transition can only be won once");

        let port = MuxerPort::new(pending.backend, self.destination.clone());
        let receiver = pending.receiver;
        let shared = self.shared.clone();
        // The writing thread runs detached; it exits after the terminal
        // transition (or when the recorder is dropped mid-session).
        if let Err(e) = std::thread::Builder::new()
            .name("reelwriter-writing".into())
            .spawn(move || writing_thread(shared, port, tracks, receiver))
        {
            // Reported like any other preparation failure
            self.shared.fail(RecorderError::Muxer(MuxerError::Open(format!(
                "Failed to spawn writing thread: {}",
                e
            ))));
        }
        Ok(())
    }

    /// Append one video frame; fire-and-forget
    pub fn append_video_sample(&self, payload: Arc<[u8]>, pts: MediaTime) {
        self.append_sample(Sample::video(pts, payload));
    }

    /// Append one pre-formed audio sample; fire-and-forget
    pub fn append_audio_sample(&self, sample: Sample) {
        debug_assert_eq!(sample.kind, MediaKind::Audio);
        self.append_sample(sample);
    }

    /// Common append path
    ///
    /// The status check here is a fast-path filter on the caller's thread: it
    /// keeps the writing queue clear of guaranteed-to-be-dropped work during
    /// shutdown. The authoritative fence is the FIFO ordering of the queue.
    fn append_sample(&self, sample: Sample) {
        let status = self.shared.status();
        if status.drops_appends() {
            // Expected tail of in-flight capture buffers racing a stop
            tracing::trace!("Dropping {} sample while {}", sample.kind, status);
            return;
        }
        if status < RecorderStatus::Recording {
            debug_assert!(false, "append called while {}", status);
            tracing::warn!("Dropping {} sample appended while {}", sample.kind, status);
            return;
        }
        // Send can only fail once the worker has torn down, i.e. post-terminal
        let _ = self.sender.send(WriteCommand::Append(sample));
    }

    /// Stop accepting samples and finalize the container
    ///
    /// Transitions to `FinishingPart1` before returning, so no append made
    /// after this call is accepted. Calling after a failure is tolerated with
    /// a warning, since failures land asynchronously and callers may race
    /// them. Completion is reported via `on_finished`/`on_failed`.
    pub fn finish_recording(&self) -> RecorderResult<()> {
        {
            let mut control = self.shared.control.write();
            match control.status {
                RecorderStatus::Recording => {
                    control.status = RecorderStatus::FinishingPart1;
                }
                RecorderStatus::Failed => {
                    tracing::warn!("finish_recording called after failure; ignoring");
                    return Ok(());
                }
                status => {
                    return Err(RecorderError::InvalidState {
                        operation: "finish_recording",
                        status,
                    });
                }
            }
        }
        tracing::info!("Finishing recording");
        let _ = self.sender.send(WriteCommand::Finish);
        Ok(())
    }
}

/// The writing thread: sole owner of the muxer port
///
/// Processes commands strictly in submission order. By the time the finish
/// command is dequeued, every append enqueued before `finish_recording` was
/// called has already executed, and none enqueued after it will ever run.
fn writing_thread(
    shared: Arc<Shared>,
    mut port: MuxerPort,
    tracks: Vec<TrackDescriptor>,
    receiver: Receiver<WriteCommand>,
) {
    let prepared = port.open().and_then(|_| {
        for descriptor in &tracks {
            port.add_track(descriptor)?;
        }
        port.start_writing()
    });
    if let Err(e) = prepared {
        shared.fail(e.into());
        return;
    }

    {
        let mut control = shared.control.write();
        debug_assert_eq!(control.status, RecorderStatus::PreparingToRecord);
        control.status = RecorderStatus::Recording;
    }
    tracing::info!("Recording started: {}", port.destination().display());
    shared.delegate.on_preparing_finished();

    // Session latch: first sample of either stream defines time zero. Only
    // this thread reads or writes it, so a plain Option suffices.
    let mut session_start: Option<MediaTime> = None;

    while let Ok(command) = receiver.recv() {
        match command {
            WriteCommand::Append(sample) => {
                if shared.status().drops_appends() {
                    continue;
                }
                if session_start.is_none() {
                    if let Err(e) = port.start_session(sample.pts) {
                        shared.fail(e.into());
                        break;
                    }
                    tracing::info!("Session started at {}", sample.pts);
                    session_start = Some(sample.pts);
                }
                match port.append(&sample) {
                    Ok(AppendOutcome::Appended) => {}
                    Ok(AppendOutcome::NotReady) => {
                        shared.dropped_samples.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            "Muxer not ready for {} data; sample at {} dropped",
                            sample.kind,
                            sample.pts
                        );
                    }
                    Err(e) => {
                        shared.fail(e.into());
                        break;
                    }
                }
            }
            WriteCommand::Finish => {
                {
                    let mut control = shared.control.write();
                    // A failure may have overtaken the finish request
                    if control.status != RecorderStatus::FinishingPart1 {
                        break;
                    }
                    control.status = RecorderStatus::FinishingPart2;
                }
                match port.finish() {
                    Ok(()) => {
                        shared.control.write().status = RecorderStatus::Finished;
                        tracing::info!("Recording finished: {}", port.destination().display());
                        shared.delegate.on_finished();
                    }
                    Err(e) => shared.fail(e.into()),
                }
                break;
            }
        }
    }

    // Port (muxer and track handles) is released here, after all in-flight
    // queue work has run.
    drop(port);
    tracing::debug!("Writing thread exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::muxer::{MuxerError, MuxerResult, TrackHandle};
    use std::path::Path;
    use std::sync::mpsc::SyncSender;
    use std::time::Duration;

    /// Backend that accepts everything
    struct NullBackend;

    impl ContainerBackend for NullBackend {
        fn open(&mut self, _destination: &Path) -> MuxerResult<()> {
            Ok(())
        }
        fn add_track(&mut self, _descriptor: &TrackDescriptor) -> MuxerResult<TrackHandle> {
            Ok(TrackHandle(0))
        }
        fn start_writing(&mut self) -> MuxerResult<()> {
            Ok(())
        }
        fn start_session(&mut self, _at: MediaTime) -> MuxerResult<()> {
            Ok(())
        }
        fn append(&mut self, _track: TrackHandle, _sample: &Sample) -> MuxerResult<AppendOutcome> {
            Ok(AppendOutcome::Appended)
        }
        fn finish(&mut self) -> MuxerResult<()> {
            Ok(())
        }
    }

    /// Delegate forwarding callbacks to a channel for synchronous assertions
    struct ChannelDelegate {
        tx: std::sync::Mutex<SyncSender<&'static str>>,
    }

    impl ChannelDelegate {
        fn pair() -> (Arc<Self>, std::sync::mpsc::Receiver<&'static str>) {
            let (tx, rx) = std::sync::mpsc::sync_channel(16);
            (
                Arc::new(Self {
                    tx: std::sync::Mutex::new(tx),
                }),
                rx,
            )
        }
    }

    impl RecorderDelegate for ChannelDelegate {
        fn on_preparing_finished(&self) {
            let _ = self.tx.lock().unwrap().send("prepared");
        }
        fn on_failed(&self, _error: &RecorderError) {
            let _ = self.tx.lock().unwrap().send("failed");
        }
        fn on_finished(&self) {
            let _ = self.tx.lock().unwrap().send("finished");
        }
    }

    fn recorder() -> (MovieRecorder, std::sync::mpsc::Receiver<&'static str>) {
        let (delegate, rx) = ChannelDelegate::pair();
        (
            MovieRecorder::new(PathBuf::from("/tmp/test.rwsl"), Box::new(NullBackend), delegate),
            rx,
        )
    }

    #[test]
    fn test_duplicate_track_rejected() {
        let (recorder, _rx) = recorder();
        recorder
            .add_video_track(FormatDescription::video(1280, 720), Map::new())
            .unwrap();
        let err = recorder
            .add_video_track(FormatDescription::video(1280, 720), Map::new())
            .unwrap_err();
        assert!(matches!(err, RecorderError::DuplicateTrack(MediaKind::Video)));
    }

    #[test]
    fn test_add_track_after_prepare_rejected() {
        let (recorder, rx) = recorder();
        recorder
            .add_video_track(FormatDescription::video(1280, 720), Map::new())
            .unwrap();
        recorder.prepare_to_record().unwrap();
        let err = recorder
            .add_audio_track(FormatDescription::audio(44_100, 2), Map::new())
            .unwrap_err();
        assert!(matches!(err, RecorderError::InvalidState { .. }));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "prepared");
    }

    #[test]
    fn test_prepare_twice_rejected() {
        let (recorder, rx) = recorder();
        recorder
            .add_video_track(FormatDescription::video(1280, 720), Map::new())
            .unwrap();
        recorder.prepare_to_record().unwrap();
        assert!(matches!(
            recorder.prepare_to_record(),
            Err(RecorderError::InvalidState { .. })
        ));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "prepared");
    }

    #[test]
    fn test_finish_from_idle_rejected() {
        let (recorder, _rx) = recorder();
        assert!(matches!(
            recorder.finish_recording(),
            Err(RecorderError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_prepare_failure_reports_failed() {
        struct FailingBackend;
        impl ContainerBackend for FailingBackend {
            fn open(&mut self, _destination: &Path) -> MuxerResult<()> {
                Err(MuxerError::Open("disk full".into()))
            }
            fn add_track(&mut self, _d: &TrackDescriptor) -> MuxerResult<TrackHandle> {
                unreachable!()
            }
            fn start_writing(&mut self) -> MuxerResult<()> {
                unreachable!()
            }
            fn start_session(&mut self, _at: MediaTime) -> MuxerResult<()> {
                unreachable!()
            }
            fn append(&mut self, _t: TrackHandle, _s: &Sample) -> MuxerResult<AppendOutcome> {
                unreachable!()
            }
            fn finish(&mut self) -> MuxerResult<()> {
                unreachable!()
            }
        }

        let (delegate, rx) = ChannelDelegate::pair();
        let recorder = MovieRecorder::new(
            PathBuf::from("/tmp/test.rwsl"),
            Box::new(FailingBackend),
            delegate,
        );
        recorder
            .add_video_track(FormatDescription::video(640, 480), Map::new())
            .unwrap();
        recorder.prepare_to_record().unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "failed");
        assert_eq!(recorder.status(), RecorderStatus::Failed);
        // Lenient by design: failures land asynchronously and callers race them
        recorder.finish_recording().unwrap();
    }
}
