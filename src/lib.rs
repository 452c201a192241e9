//! reelwriter - asset-recording core for real-time capture pipelines.
//!
//! Implements the recording state machine, the single-threaded muxer port
//! discipline, and the capture pipeline glue that connects independently
//! scheduled video and audio capture streams to one output container.
//!
//! The capture devices, effect filters, encoders and UI around this core are
//! external collaborators: they hand in format descriptions and timestamped
//! sample buffers, and consume lifecycle events.

pub mod media;
pub mod muxer;
pub mod pipeline;
pub mod recorder;

pub use media::{FormatDescription, MediaKind, MediaTime, Sample, TrackDescriptor};
pub use muxer::{ContainerBackend, MuxerPort, SampleLogBackend};
pub use pipeline::{CapturePipeline, CaptureSource, RecordingConfig, SampleSender};
pub use recorder::{
    MovieRecorder, RecorderDelegate, RecorderError, RecorderEvent, RecorderStatus,
};
