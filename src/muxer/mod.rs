//! Container muxing
//!
//! The muxer port wraps a single-threaded, non-reentrant container backend.
//! Nothing outside this module (and the recorder's writing thread, which owns
//! the port) ever touches a backend directly: the backend contract allows no
//! concurrent calls, and the whole recorder design exists to honor that.

pub mod port;
pub mod sample_log;

pub use port::MuxerPort;
pub use sample_log::SampleLogBackend;

use crate::media::{MediaTime, Sample, TrackDescriptor};
use std::path::Path;
use thiserror::Error;

/// Errors reported by a container backend or the muxer port
#[derive(Error, Debug, Clone)]
pub enum MuxerError {
    #[error("Failed to open container: {0}")]
    Open(String),

    #[error("Track configuration rejected: {0}")]
    TrackConfiguration(String),

    #[error("Failed to start writing: {0}")]
    WriteStart(String),

    #[error("Append failed: {0}")]
    Append(String),

    #[error("Failed to finalize container: {0}")]
    Finish(String),
}

/// Result type for muxer operations
pub type MuxerResult<T> = Result<T, MuxerError>;

/// Handle to a track registered with a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle(pub u32);

/// Outcome of an append call
///
/// `NotReady` is backpressure, not failure: the caller drops the sample and
/// keeps recording. Real-time capture must never block on writer throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Sample accepted by the container
    Appended,
    /// Track cannot take more data right now; sample should be dropped
    NotReady,
}

/// A container writer (MP4/MOV-equivalent)
///
/// Backends are single-threaded and non-reentrant: all calls must come from
/// one thread, serialized. The trait is `Send` so the writing thread can take
/// ownership, but deliberately not `Sync`.
///
/// Call order: `open`, then `add_track` for each track, then `start_writing`,
/// then exactly one `start_session` before the first `append`, then `finish`.
pub trait ContainerBackend: Send {
    /// Create the underlying container at `destination`
    fn open(&mut self, destination: &Path) -> MuxerResult<()>;

    /// Register a track; validates descriptor/settings compatibility
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> MuxerResult<TrackHandle>;

    /// Commit the track layout and begin accepting samples
    fn start_writing(&mut self) -> MuxerResult<()>;

    /// Establish time zero for the container
    fn start_session(&mut self, at: MediaTime) -> MuxerResult<()>;

    /// Write one sample to a track
    fn append(&mut self, track: TrackHandle, sample: &Sample) -> MuxerResult<AppendOutcome>;

    /// Finalize the container (trailer write, flush)
    fn finish(&mut self) -> MuxerResult<()>;
}
