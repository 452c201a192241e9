//! Muxer port
//!
//! Serialization boundary in front of a container backend. The port is owned
//! by exactly one thread at a time (the recorder moves it onto the writing
//! thread) and enforces the backend's call-order contract with typed errors
//! instead of undefined behavior.

use super::{AppendOutcome, ContainerBackend, MuxerError, MuxerResult, TrackHandle};
use crate::media::{MediaKind, MediaTime, Sample, TrackDescriptor};
use std::collections::HashMap;
use std::path::PathBuf;

/// Wraps a container backend and its registered tracks
pub struct MuxerPort {
    backend: Box<dyn ContainerBackend>,
    destination: PathBuf,
    tracks: HashMap<MediaKind, TrackHandle>,
    opened: bool,
    writing: bool,
    session_started: bool,
}

impl MuxerPort {
    /// Create a port over a backend; nothing is opened yet
    pub fn new(backend: Box<dyn ContainerBackend>, destination: PathBuf) -> Self {
        Self {
            backend,
            destination,
            tracks: HashMap::new(),
            opened: false,
            writing: false,
            session_started: false,
        }
    }

    /// Destination path of the container
    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }

    /// Open the underlying container
    pub fn open(&mut self) -> MuxerResult<()> {
        if self.opened {
            return Err(MuxerError::Open("container already open".into()));
        }
        self.backend.open(&self.destination)?;
        self.opened = true;
        tracing::debug!("Muxer opened: {}", self.destination.display());
        Ok(())
    }

    /// Register a track with the backend
    ///
    /// Settings compatibility is validated by the backend before the track is
    /// committed, so a rejected configuration leaves the container untouched.
    pub fn add_track(&mut self, descriptor: &TrackDescriptor) -> MuxerResult<TrackHandle> {
        if !self.opened {
            return Err(MuxerError::TrackConfiguration(
                "container not open".into(),
            ));
        }
        if self.writing {
            return Err(MuxerError::TrackConfiguration(
                "tracks must be added before writing starts".into(),
            ));
        }
        if self.tracks.contains_key(&descriptor.kind) {
            return Err(MuxerError::TrackConfiguration(format!(
                "{} track already registered",
                descriptor.kind
            )));
        }
        let handle = self.backend.add_track(descriptor)?;
        self.tracks.insert(descriptor.kind, handle);
        tracing::debug!("Muxer track added: {} -> {:?}", descriptor.kind, handle);
        Ok(handle)
    }

    /// Commit the track layout and begin accepting samples
    pub fn start_writing(&mut self) -> MuxerResult<()> {
        if !self.opened || self.tracks.is_empty() {
            return Err(MuxerError::WriteStart(
                "container must be open with at least one track".into(),
            ));
        }
        self.backend.start_writing()?;
        self.writing = true;
        Ok(())
    }

    /// Establish time zero; must be called exactly once, before any append
    pub fn start_session(&mut self, at: MediaTime) -> MuxerResult<()> {
        if !self.writing {
            return Err(MuxerError::WriteStart("writing not started".into()));
        }
        if self.session_started {
            return Err(MuxerError::WriteStart("session already started".into()));
        }
        self.backend.start_session(at)?;
        self.session_started = true;
        tracing::debug!("Muxer session started at {}", at);
        Ok(())
    }

    /// Whether `start_session` has been called
    pub fn is_session_started(&self) -> bool {
        self.session_started
    }

    /// Append one sample to the track matching its kind
    pub fn append(&mut self, sample: &Sample) -> MuxerResult<AppendOutcome> {
        if !self.session_started {
            return Err(MuxerError::Append("session not started".into()));
        }
        let handle = self.tracks.get(&sample.kind).copied().ok_or_else(|| {
            MuxerError::Append(format!("no {} track registered", sample.kind))
        })?;
        self.backend.append(handle, sample)
    }

    /// Finalize the container
    pub fn finish(&mut self) -> MuxerResult<()> {
        if !self.writing {
            return Err(MuxerError::Finish("writing not started".into()));
        }
        self.backend.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FormatDescription;
    use parking_lot::Mutex;
    use serde_json::Map;
    use std::sync::Arc;

    /// Backend that records the calls it receives
    struct ProbeBackend {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ContainerBackend for ProbeBackend {
        fn open(&mut self, _destination: &std::path::Path) -> MuxerResult<()> {
            self.calls.lock().push("open".into());
            Ok(())
        }

        fn add_track(&mut self, descriptor: &TrackDescriptor) -> MuxerResult<TrackHandle> {
            self.calls.lock().push(format!("add_track:{}", descriptor.kind));
            Ok(TrackHandle(self.calls.lock().len() as u32))
        }

        fn start_writing(&mut self) -> MuxerResult<()> {
            self.calls.lock().push("start_writing".into());
            Ok(())
        }

        fn start_session(&mut self, at: MediaTime) -> MuxerResult<()> {
            self.calls.lock().push(format!("start_session:{}", at));
            Ok(())
        }

        fn append(&mut self, _track: TrackHandle, sample: &Sample) -> MuxerResult<AppendOutcome> {
            self.calls.lock().push(format!("append:{}", sample.kind));
            Ok(AppendOutcome::Appended)
        }

        fn finish(&mut self) -> MuxerResult<()> {
            self.calls.lock().push("finish".into());
            Ok(())
        }
    }

    fn probe_port() -> (MuxerPort, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = ProbeBackend {
            calls: calls.clone(),
        };
        (
            MuxerPort::new(Box::new(backend), PathBuf::from("/tmp/probe.mov")),
            calls,
        )
    }

    fn video_descriptor() -> TrackDescriptor {
        TrackDescriptor::new(
            MediaKind::Video,
            FormatDescription::video(1280, 720),
            Map::new(),
        )
    }

    #[test]
    fn test_call_order_enforced() {
        let (mut port, _calls) = probe_port();

        // Append before open/session is a typed error, never a backend call
        let sample = Sample::video(MediaTime::ZERO, Arc::from(vec![0u8].into_boxed_slice()));
        assert!(matches!(port.append(&sample), Err(MuxerError::Append(_))));

        port.open().unwrap();
        assert!(matches!(
            port.start_writing(),
            Err(MuxerError::WriteStart(_))
        ));

        port.add_track(&video_descriptor()).unwrap();
        port.start_writing().unwrap();
        port.start_session(MediaTime::ZERO).unwrap();
        assert_eq!(port.append(&sample).unwrap(), AppendOutcome::Appended);
    }

    #[test]
    fn test_duplicate_session_start_rejected() {
        let (mut port, _calls) = probe_port();
        port.open().unwrap();
        port.add_track(&video_descriptor()).unwrap();
        port.start_writing().unwrap();
        port.start_session(MediaTime::ZERO).unwrap();
        assert!(matches!(
            port.start_session(MediaTime::from_millis(10)),
            Err(MuxerError::WriteStart(_))
        ));
    }

    #[test]
    fn test_duplicate_track_kind_rejected_before_backend() {
        let (mut port, calls) = probe_port();
        port.open().unwrap();
        port.add_track(&video_descriptor()).unwrap();
        let before = calls.lock().len();
        assert!(matches!(
            port.add_track(&video_descriptor()),
            Err(MuxerError::TrackConfiguration(_))
        ));
        assert_eq!(calls.lock().len(), before);
    }

    #[test]
    fn test_append_unknown_kind_rejected() {
        let (mut port, _calls) = probe_port();
        port.open().unwrap();
        port.add_track(&video_descriptor()).unwrap();
        port.start_writing().unwrap();
        port.start_session(MediaTime::ZERO).unwrap();

        let audio = Sample::audio(MediaTime::ZERO, Arc::from(vec![0u8].into_boxed_slice()));
        assert!(matches!(port.append(&audio), Err(MuxerError::Append(_))));
    }
}
